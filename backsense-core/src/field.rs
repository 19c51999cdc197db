//! Bit-field extraction for detection frame payloads.
//!
//! Every physical quantity lives in a window of a single payload byte. A
//! `FieldSpec` names the byte, the bit window (counted from the LSB), and the
//! linear conversion `raw * scale + offset`. The register map of the sensor
//! is the static `CATALOGUE` below; one generic `extract` serves all entries.

use crate::types::PAYLOAD_LEN;

const BYTE_BITS: u8 = 8;

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// Where and how to read one quantity from a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub byte_index: usize,
    /// First bit of the field, 0 = LSB.
    pub start_bit: u8,
    pub bit_length: u8,
    pub scale: f64,
    pub offset: i32,
    /// Declared bounds of the whole byte, before masking. Diagnostic only.
    pub raw_min: u8,
    pub raw_max: u8,
}

impl FieldSpec {
    /// A field occupying the whole byte.
    pub const fn byte(byte_index: usize, scale: f64, offset: i32) -> Self {
        assert!(byte_index < PAYLOAD_LEN);
        FieldSpec {
            byte_index,
            start_bit: 0,
            bit_length: BYTE_BITS,
            scale,
            offset,
            raw_min: 0x00,
            raw_max: 0xFF,
        }
    }

    /// A sub-byte field of `bit_length` bits starting at `start_bit`.
    pub const fn bits(byte_index: usize, start_bit: u8, bit_length: u8) -> Self {
        assert!(byte_index < PAYLOAD_LEN);
        assert!(bit_length >= 1 && start_bit + bit_length <= BYTE_BITS);
        FieldSpec {
            byte_index,
            start_bit,
            bit_length,
            scale: 1.0,
            offset: 0,
            raw_min: 0x00,
            raw_max: 0xFF,
        }
    }

    pub const fn with_raw_range(mut self, raw_min: u8, raw_max: u8) -> Self {
        self.raw_min = raw_min;
        self.raw_max = raw_max;
        self
    }

    /// True if the window fits the byte and the byte is in the payload.
    pub fn is_valid(&self) -> bool {
        self.byte_index < PAYLOAD_LEN
            && self.bit_length >= 1
            && self.start_bit.checked_add(self.bit_length).is_some_and(|end| end <= BYTE_BITS)
    }

    /// True if the unmasked byte lies within the declared raw range.
    pub fn raw_in_range(&self, byte: u8) -> bool {
        (self.raw_min..=self.raw_max).contains(&byte)
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Numeric types a field can be converted into.
pub trait PhysicalValue: Copy {
    fn from_raw(raw: u8, scale: f64, offset: i32) -> Self;
}

impl PhysicalValue for f64 {
    fn from_raw(raw: u8, scale: f64, offset: i32) -> Self {
        f64::from(raw) * scale + f64::from(offset)
    }
}

/// Discrete quantities only: the scale must be a whole number.
impl PhysicalValue for i32 {
    fn from_raw(raw: u8, scale: f64, offset: i32) -> Self {
        debug_assert!(scale.fract() == 0.0, "fractional scale {scale} read as i32");
        i32::from(raw) * scale as i32 + offset
    }
}

/// Right-aligned field bits, before scaling.
///
/// The byte is shifted down to `start_bit` first and masked afterwards, so
/// bits above the window never leak into the result.
pub fn extract_raw(payload: &[u8; PAYLOAD_LEN], spec: &FieldSpec) -> u8 {
    let byte = payload[spec.byte_index];
    if spec.bit_length >= BYTE_BITS {
        return byte;
    }
    let mask = (1u8 << spec.bit_length) - 1;
    (byte >> spec.start_bit) & mask
}

/// Physical value of one field.
pub fn extract<T: PhysicalValue>(payload: &[u8; PAYLOAD_LEN], spec: &FieldSpec) -> T {
    T::from_raw(extract_raw(payload, spec), spec.scale, spec.offset)
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

/// The ten quantities carried by a detection frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    PolarRadius,
    PolarAngle,
    X,
    Y,
    RelativeSpeed,
    SignalPower,
    ObjectId,
    AppearanceStatus,
    TriggerEvent,
    DetectionFlag,
}

/// Catalogue entry: the quantity, its display name and unit, and its layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldInfo {
    pub quantity: Quantity,
    pub name: &'static str,
    pub unit: &'static str,
    pub spec: FieldSpec,
}

/// Sensor register map.
pub static CATALOGUE: [FieldInfo; 10] = [
    FieldInfo {
        quantity: Quantity::PolarRadius,
        name: "Polar Radius",
        unit: "m",
        spec: FieldSpec::byte(0, 0.25, 0).with_raw_range(0x00, 0x79),
    },
    FieldInfo {
        quantity: Quantity::PolarAngle,
        name: "Polar Angle",
        unit: "deg",
        spec: FieldSpec::byte(1, 1.0, -128).with_raw_range(0x44, 0xBC),
    },
    FieldInfo {
        quantity: Quantity::X,
        name: "X",
        unit: "m",
        spec: FieldSpec::byte(2, 0.25, 0).with_raw_range(0x00, 0x78),
    },
    FieldInfo {
        quantity: Quantity::Y,
        name: "Y",
        unit: "m",
        spec: FieldSpec::byte(3, 0.25, -32).with_raw_range(0x6C, 0x94),
    },
    FieldInfo {
        quantity: Quantity::RelativeSpeed,
        name: "Relative Speed",
        unit: "m/s",
        spec: FieldSpec::byte(4, 0.5, -128),
    },
    FieldInfo {
        quantity: Quantity::SignalPower,
        name: "Signal Power",
        unit: "",
        spec: FieldSpec::byte(5, 1.0, 0).with_raw_range(0x00, 0x7F),
    },
    FieldInfo {
        quantity: Quantity::ObjectId,
        name: "Object Id",
        unit: "",
        spec: FieldSpec::bits(6, 5, 3),
    },
    FieldInfo {
        quantity: Quantity::AppearanceStatus,
        name: "Object Appearance",
        unit: "",
        spec: FieldSpec::bits(6, 4, 1),
    },
    FieldInfo {
        quantity: Quantity::TriggerEvent,
        name: "Trigger Event",
        unit: "",
        spec: FieldSpec::bits(6, 1, 2),
    },
    FieldInfo {
        quantity: Quantity::DetectionFlag,
        name: "Detection Flag",
        unit: "",
        spec: FieldSpec::bits(7, 0, 1).with_raw_range(0x00, 0x01),
    },
];

impl Quantity {
    pub const ALL: [Quantity; 10] = [
        Quantity::PolarRadius,
        Quantity::PolarAngle,
        Quantity::X,
        Quantity::Y,
        Quantity::RelativeSpeed,
        Quantity::SignalPower,
        Quantity::ObjectId,
        Quantity::AppearanceStatus,
        Quantity::TriggerEvent,
        Quantity::DetectionFlag,
    ];

    pub fn info(self) -> &'static FieldInfo {
        // CATALOGUE is declared in enum order.
        &CATALOGUE[self as usize]
    }

    pub fn spec(self) -> &'static FieldSpec {
        &self.info().spec
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn unit(self) -> &'static str {
        self.info().unit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
