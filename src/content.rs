use std::{collections::HashMap, error::Error};

use base64::Engine;
use once_cell::sync::Lazy;
use serde_json::Value;

// decoders --

pub struct Decoder {
    pub name: &'static str,
    pub func: fn(&str) -> Result<Vec<u8>, Box<dyn Error>>,
}

pub(crate) static DECODERS: Lazy<HashMap<&'static str, Decoder>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "base64",
        Decoder {
            name: "base64",
            func: decode_base64,
        },
    );
    m
});

fn decode_base64(s: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    Ok(base64::engine::general_purpose::STANDARD.decode(s)?)
}

// mediatypes --

pub struct MediaType {
    pub name: &'static str,
    pub func: fn(&[u8], bool) -> Result<Option<Value>, Box<dyn Error>>,
}

pub(crate) static MEDIA_TYPES: Lazy<HashMap<&'static str, MediaType>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "application/json",
        MediaType {
            name: "application/json",
            func: is_json,
        },
    );
    m
});

fn is_json(bytes: &[u8], deserialize: bool) -> Result<Option<Value>, Box<dyn Error>> {
    if !deserialize {
        serde_json::from_slice::<serde::de::IgnoredAny>(bytes)?;
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice::<Value>(bytes)?))
}
