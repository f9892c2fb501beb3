//! Session protocols (§4.10): RTCS real-time certificate status, and
//! the RFC 3161 timestamp protocol.
//!
//! Both client and server sides operate on structured request/response
//! types rather than re-parsing third-party wire bytes — consistent
//! with the [`crate::cms::envelope`] engine's own simplification, the
//! work of actually walking untrusted DER here is left for a later
//! pass and recorded as an open item.

pub mod rtcs;
pub mod tsp;

/// The non-HTTP transport frame header (§6): `uint32 length, byte
/// type`, followed by `length` bytes of body. TSP is the only
/// protocol that uses it; RTCS is HTTP-only.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FrameType {
    Request = 0,
    PollRep = 1,
    PollReq = 2,
    NegPollRep = 3,
    PartialMsg = 4,
    Response = 5,
    Error = 6,
}

pub fn write_frame(frame_type: FrameType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.push(frame_type as u8);
    out.extend_from_slice(body);
    out
}

pub fn read_frame(buf: &[u8]) -> crate::error::Result<(u8, &[u8])> {
    if buf.len() < 5 {
        return Err(crate::error::ErrorKind::Underflow.into());
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let frame_type = buf[4];
    let body = buf.get(5..5 + len).ok_or(crate::error::ErrorKind::Underflow)?;
    Ok((frame_type, body))
}
