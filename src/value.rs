/// Interpretation of a stored 4 byte status value.
#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueKind {
    Int32,
    UInt32,
    Float32,
}

/// A status variable value. Only the bit pattern is persisted, so a read has to name the
/// interpretation it wants.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Value {
    Int32(i32),
    UInt32(u32),
    Float32(f32),
}

impl Value {
    pub const fn kind(&self) -> ValueKind {
        match self {
            Value::Int32(_) => ValueKind::Int32,
            Value::UInt32(_) => ValueKind::UInt32,
            Value::Float32(_) => ValueKind::Float32,
        }
    }

    pub fn to_bits(self) -> u32 {
        match self {
            Value::Int32(v) => v.cast_unsigned(),
            Value::UInt32(v) => v,
            Value::Float32(v) => v.to_bits(),
        }
    }

    pub fn from_bits(kind: ValueKind, bits: u32) -> Self {
        match kind {
            ValueKind::Int32 => Value::Int32(bits.cast_signed()),
            ValueKind::UInt32 => Value::UInt32(bits),
            ValueKind::Float32 => Value::Float32(f32::from_bits(bits)),
        }
    }

    pub fn as_i32(self) -> i32 {
        self.to_bits().cast_signed()
    }

    pub fn as_u32(self) -> u32 {
        self.to_bits()
    }

    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.to_bits())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::UInt32(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float32(value)
    }
}
