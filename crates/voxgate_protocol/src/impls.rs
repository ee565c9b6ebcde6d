//! Implementations of [`Encode`](crate::Encode) and [`Decode`](crate::Decode)
//! on primitives and foreign types.

use std::io::Write;
use std::mem;

use anyhow::{bail, ensure};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use glam::{IVec3, Vec3};
use uuid::Uuid;

use crate::{Decode, Encode};

/// Prevents preallocating too much memory in case we get a malicious or
/// invalid sequence length.
fn cautious_capacity<Element>(size_hint: usize) -> usize {
    const MAX_PREALLOC_BYTES: usize = 1024 * 1024;

    if mem::size_of::<Element>() == 0 {
        0
    } else {
        size_hint.min(MAX_PREALLOC_BYTES / mem::size_of::<Element>())
    }
}

impl Encode for bool {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        Ok(w.write_u8(u8::from(*self))?)
    }
}

impl Decode for bool {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        match r.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            n => bail!("invalid bool byte {n}"),
        }
    }
}

impl Encode for u8 {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        Ok(w.write_u8(*self)?)
    }
}

impl Decode for u8 {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(r.read_u8()?)
    }
}

impl Encode for i8 {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        Ok(w.write_i8(*self)?)
    }
}

impl Decode for i8 {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(r.read_i8()?)
    }
}

macro_rules! impl_scalar {
    ($($ty:ty => $write:ident / $read:ident,)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
                    Ok(w.$write::<LE>(*self)?)
                }
            }

            impl Decode for $ty {
                fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
                    Ok(r.$read::<LE>()?)
                }
            }
        )*
    }
}

impl_scalar! {
    u16 => write_u16 / read_u16,
    i16 => write_i16 / read_i16,
    u32 => write_u32 / read_u32,
    i32 => write_i32 / read_i32,
    u64 => write_u64 / read_u64,
    i64 => write_i64 / read_i64,
    u128 => write_u128 / read_u128,
    f32 => write_f32 / read_f32,
    f64 => write_f64 / read_f64,
}

impl Encode for str {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        let len = u32::try_from(self.len())?;
        len.encode(&mut w)?;
        Ok(w.write_all(self.as_bytes())?)
    }
}

impl Encode for String {
    fn encode(&self, w: impl Write) -> anyhow::Result<()> {
        self.as_str().encode(w)
    }
}

impl Decode for String {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        let len = u32::decode(r)? as usize;
        ensure!(r.len() >= len, "not enough data to decode string of length {len}");

        let (bytes, rest) = r.split_at(len);
        *r = rest;

        Ok(std::str::from_utf8(bytes)?.to_owned())
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        match self {
            Some(value) => {
                true.encode(&mut w)?;
                value.encode(w)
            }
            None => false.encode(w),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(if bool::decode(r)? {
            Some(T::decode(r)?)
        } else {
            None
        })
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        let len = u32::try_from(self.len())?;
        len.encode(&mut w)?;

        for value in self {
            value.encode(&mut w)?;
        }

        Ok(())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: impl Write) -> anyhow::Result<()> {
        self.as_slice().encode(w)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        let len = u32::decode(r)? as usize;

        let mut values = Self::with_capacity(cautious_capacity::<T>(len));
        for _ in 0..len {
            values.push(T::decode(r)?);
        }

        Ok(values)
    }
}

impl Encode for Uuid {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        Ok(w.write_all(self.as_bytes())?)
    }
}

impl Decode for Uuid {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        ensure!(r.len() >= 16, "not enough data to decode a uuid");

        let (bytes, rest) = r.split_at(16);
        *r = rest;

        Ok(Self::from_slice(bytes)?)
    }
}

impl Encode for Vec3 {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.x.encode(&mut w)?;
        self.y.encode(&mut w)?;
        self.z.encode(w)
    }
}

impl Decode for Vec3 {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self::new(f32::decode(r)?, f32::decode(r)?, f32::decode(r)?))
    }
}

impl Encode for IVec3 {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.x.encode(&mut w)?;
        self.y.encode(&mut w)?;
        self.z.encode(w)
    }
}

impl Decode for IVec3 {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self::new(i32::decode(r)?, i32::decode(r)?, i32::decode(r)?))
    }
}
