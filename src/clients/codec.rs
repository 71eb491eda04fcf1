//! Body codecs.
//!
//! A [`Codec`] turns the raw body of a successful response into the type a
//! [`Request`](crate::Request) declares. The codec travels with the request,
//! so each call site picks its decoder without any runtime type inspection.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::clients::errors::CodecError;
use crate::clients::http_response::Headers;

/// Decodes a successful response body into `T`.
///
/// # Example
///
/// ```rust
/// use api_client::{Codec, CodecError, Headers};
///
/// struct Utf8Codec;
///
/// impl Codec<String> for Utf8Codec {
///     fn decode(&self, body: &[u8], _headers: &Headers) -> Result<String, CodecError> {
///         String::from_utf8(body.to_vec()).map_err(|e| CodecError::Decode {
///             message: e.to_string(),
///         })
///     }
/// }
///
/// let text = Utf8Codec.decode(b"hello", &Headers::new()).unwrap();
/// assert_eq!(text, "hello");
/// ```
pub trait Codec<T>: Send + Sync {
    /// Decodes `body`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the body does not match `T`.
    fn decode(&self, body: &[u8], headers: &Headers) -> Result<T, CodecError>;
}

/// JSON codec backed by `serde_json`.
///
/// An empty body decodes as JSON `null`, so `()` and `Option<T>` responses
/// accept `204 No Content`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Serializes `value` to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode {
                message: e.to_string(),
            })
    }
}

impl<T: DeserializeOwned> Codec<T> for JsonCodec {
    fn decode(&self, body: &[u8], _headers: &Headers) -> Result<T, CodecError> {
        let body = if body.iter().all(u8::is_ascii_whitespace) {
            b"null".as_slice()
        } else {
            body
        };
        serde_json::from_slice(body).map_err(|e| CodecError::Decode {
            message: e.to_string(),
        })
    }
}

/// Codec that ignores the body entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyBodyCodec;

impl Codec<()> for EmptyBodyCodec {
    fn decode(&self, _body: &[u8], _headers: &Headers) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Codec that hands back the raw body bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl Codec<Bytes> for BytesCodec {
    fn decode(&self, body: &[u8], _headers: &Headers) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pet {
        id: u64,
        name: String,
    }

    #[test]
    fn test_json_codec_decodes_declared_type() {
        let pet: Pet = JsonCodec
            .decode(br#"{"id":42,"name":"Rex"}"#, &Headers::new())
            .unwrap();
        assert_eq!(
            pet,
            Pet {
                id: 42,
                name: "Rex".to_string()
            }
        );
    }

    #[test]
    fn test_json_codec_reports_shape_mismatch() {
        let result: Result<Pet, _> = JsonCodec.decode(br#"{"id":42}"#, &Headers::new());
        assert!(matches!(
            result,
            Err(CodecError::Decode { message }) if message.contains("name")
        ));
    }

    #[test]
    fn test_json_codec_treats_empty_body_as_null() {
        let () = JsonCodec.decode(b"", &Headers::new()).unwrap();

        let missing: Option<Pet> = JsonCodec.decode(b"  ", &Headers::new()).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_json_codec_encode() {
        let bytes = JsonCodec::encode(&serde_json::json!({"id": 1})).unwrap();
        assert_eq!(bytes.as_ref(), br#"{"id":1}"#);
    }

    #[test]
    fn test_empty_and_bytes_codecs() {
        assert!(EmptyBodyCodec.decode(b"not json", &Headers::new()).is_ok());
        assert_eq!(
            BytesCodec.decode(b"raw", &Headers::new()).unwrap().as_ref(),
            b"raw"
        );
    }
}
