use serde::{de::DeserializeOwned, Serialize};

use crate::error::StoreError;

/// Encoding used to keep published documents at rest.
pub trait FormCodec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError>;
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, StoreError>;
}

// MessagePack codec (compact storage format)
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgPackCodec;

impl FormCodec for MsgPackCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        rmp_serde::to_vec_named(value).map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, StoreError> {
        rmp_serde::from_slice(data).map_err(|e| StoreError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormDraft;
    use crate::question::IdAllocator;

    fn record() -> crate::form::FormRecord {
        let mut draft = FormDraft::default();
        draft.set_details("Volunteers", "");
        draft.add_blank(IdAllocator::default().next_id());
        draft.to_record().unwrap()
    }

    #[test]
    fn msgpack_keeps_field_names_and_placeholder() {
        let rec = record();
        let bytes = MsgPackCodec.encode(&rec).unwrap();
        let back: crate::form::FormRecord = MsgPackCodec.decode(&bytes).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let err = MsgPackCodec
            .decode::<crate::form::FormRecord>(&[])
            .unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
    }
}
