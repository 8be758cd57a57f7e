//! Sample value rendering and its JSON encoding.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;

/// Render a sample value the way the exposition format expects it.
///
/// Finite numbers use the shortest round-trip decimal form; negative zero is
/// printed as `0`.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "Nan".to_string()
    } else if v.is_infinite() {
        if v < 0.0 { "-Inf".to_string() } else { "+Inf".to_string() }
    } else if v == 0.0 {
        "0".to_string()
    } else {
        v.to_string()
    }
}

/// Serde adapter for sample values.
///
/// JSON has no NaN/Infinity, so non-finite values travel as `"NaN"`, `"+Inf"`
/// and `"-Inf"`. `null` decodes as NaN.
pub mod sample {
    use super::*;

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_str("NaN")
        } else if v.is_infinite() {
            s.serialize_str(if *v < 0.0 { "-Inf" } else { "+Inf" })
        } else {
            s.serialize_f64(*v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        d.deserialize_any(SampleVisitor)
    }

    struct SampleVisitor;

    impl<'de> Visitor<'de> for SampleVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number, null, or one of \"NaN\", \"+Inf\", \"-Inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
            Ok(f64::NAN)
        }

        fn visit_none<E: de::Error>(self) -> Result<f64, E> {
            Ok(f64::NAN)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "NaN" | "Nan" => Ok(f64::NAN),
                "+Inf" | "Inf" => Ok(f64::INFINITY),
                "-Inf" => Ok(f64::NEG_INFINITY),
                other => other
                    .parse::<f64>()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}
