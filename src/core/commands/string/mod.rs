pub mod append;
pub mod bitcount;
pub mod bitfield;
pub mod bitop;
pub mod bitpos;
pub mod decr;
pub mod decrby;
pub mod get;
pub mod getbit;
pub mod getdel;
pub mod getex;
pub mod getrange;
pub mod getset;
pub mod incr;
pub mod incrby;
pub mod incrbyfloat;
pub mod mget;
pub mod mset;
pub mod msetnx;
pub mod psetex;
pub mod set;
pub mod setbit;
pub mod setex;
pub mod setrange;
pub mod strlen;

pub use self::append::Append;
pub use self::bitcount::BitCount;
pub use self::bitfield::BitField;
pub use self::bitop::BitOp;
pub use self::bitpos::BitPos;
pub use self::decr::Decr;
pub use self::decrby::DecrBy;
pub use self::get::Get;
pub use self::getbit::GetBit;
pub use self::getdel::GetDel;
pub use self::getex::GetEx;
pub use self::getrange::GetRange;
pub use self::getset::GetSet;
pub use self::incr::Incr;
pub use self::incrby::IncrBy;
pub use self::incrbyfloat::IncrByFloat;
pub use self::mget::MGet;
pub use self::mset::MSet;
pub use self::msetnx::MSetNx;
pub use self::psetex::PSetEx;
pub use self::set::Set;
pub use self::setbit::SetBit;
pub use self::setex::SetEx;
pub use self::setrange::SetRange;
pub use self::strlen::StrLen;
