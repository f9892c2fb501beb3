//! BER/DER encoding primitives (§4.1).
//!
//! Tag, length, and per-universal-type readers/writers over the
//! [`pki_stream::Stream`] abstraction, with definite- and
//! indefinite-length support and an end-of-contents sentinel. Every
//! higher module in this crate (keys, cert, chain, cms, session)
//! builds on these rather than reaching for an external ASN.1 crate,
//! hand-rolling packet-header and MPI readers on top of the stream
//! abstraction instead of pulling in a generic TLV library.

mod length;
mod reader;
mod tag;
mod writer;

pub use length::{encoded_size, Length};
pub use reader::{BitString, Oid, Reader, MAX_INTEGER_BYTES, MAX_OID_BYTES};
pub use tag::{Class, Tag};
pub use writer::{context_tag, sizeof, Writer};

#[cfg(test)]
mod tests {
    use super::*;
    use pki_stream::MemoryStream;

    #[test]
    fn integer_round_trip_with_high_bit() {
        let mut buf = MemoryStream::open();
        {
            let mut w = Writer::new(&mut buf);
            w.write_integer_bytes(&[0xff, 0x01]).unwrap();
        }
        buf.as_slice().map(|s| assert_eq!(s, &[0x02, 0x03, 0x00, 0xff, 0x01]));
    }

    #[test]
    fn oid_round_trip() {
        let oid = Oid(vec![1, 2, 840, 113549, 1, 7, 2]);
        let mut buf = MemoryStream::open();
        {
            let mut w = Writer::new(&mut buf);
            w.write_oid(&oid).unwrap();
        }
        let encoded = buf.as_slice().unwrap().to_vec();
        assert_eq!(
            encoded,
            vec![0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02]
        );
        let mut read_buf = MemoryStream::open();
        {
            use pki_stream::Stream;
            read_buf.write(&encoded).unwrap();
            read_buf.seek(0).unwrap();
        }
        let mut r = Reader::new(&mut read_buf);
        let decoded = r.read_oid().unwrap();
        assert_eq!(decoded, oid);
    }

    #[test]
    fn indefinite_length_round_trip() {
        use pki_stream::Stream;
        let mut buf = MemoryStream::open();
        {
            let mut w = Writer::new(&mut buf);
            w.write_tag_indefinite(Tag::SEQUENCE).unwrap();
            w.write_boolean(true).unwrap();
            w.write_eoc().unwrap();
        }
        buf.seek(0).unwrap();
        let mut r = Reader::new(&mut buf);
        let (tag, len) = r.read_tag_length().unwrap();
        assert_eq!(tag, Tag::SEQUENCE);
        assert_eq!(len, Length::Indefinite);
        assert!(r.read_boolean().unwrap());
        r.read_eoc().unwrap();
    }

    #[test]
    fn oid_too_long_is_bad_data() {
        use pki_stream::Stream;
        let mut buf = MemoryStream::open();
        buf.write(&[0x06, 0x21]).unwrap();
        buf.write(&[0x81; 0x21]).unwrap();
        buf.seek(0).unwrap();
        let mut r = Reader::new(&mut buf);
        assert!(r.read_oid().is_err());
    }
}
