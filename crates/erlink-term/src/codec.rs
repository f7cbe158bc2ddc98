//! Encode and decode terms in the external term format.
//!
//! The format is a self-describing byte stream: an optional magic
//! version byte (131) followed by one term, where each term starts with
//! a one-byte type tag. All multi-byte integers are big-endian except
//! big-integer magnitudes, which travel little-endian.
//!
//! Decoding returns fully-owned trees: strings and binaries are copied
//! out of the input, nothing borrows the frame.

use crate::buffer::Buffer;
use crate::error::{DecodeReason, TermError};
use crate::term::{ListBuilder, Pid, Port, Ref, Term, TupleBuilder};

/// Magic byte introducing a top-level term.
pub const VERSION_MAGIC: u8 = 131;

/// An unsigned 8-bit integer.
pub const SMALL_INTEGER_EXT: u8 = 97;
/// A signed 32-bit integer.
pub const INTEGER_EXT: u8 = 98;
/// A float as 31 bytes of formatted text.
pub const FLOAT_EXT: u8 = 99;
/// An atom with a 16-bit length.
pub const ATOM_EXT: u8 = 100;
/// An old-style reference.
pub const REFERENCE_EXT: u8 = 101;
/// A port identifier.
pub const PORT_EXT: u8 = 102;
/// A process identifier.
pub const PID_EXT: u8 = 103;
/// A tuple of up to 255 elements.
pub const SMALL_TUPLE_EXT: u8 = 104;
/// A tuple with a 32-bit arity.
pub const LARGE_TUPLE_EXT: u8 = 105;
/// The empty list.
pub const NIL_EXT: u8 = 106;
/// A byte string with a 16-bit length.
pub const STRING_EXT: u8 = 107;
/// A list with a 32-bit element count plus tail.
pub const LIST_EXT: u8 = 108;
/// A binary with a 32-bit length.
pub const BINARY_EXT: u8 = 109;
/// A little-endian big integer with an 8-bit byte count.
pub const SMALL_BIG_EXT: u8 = 110;
/// A little-endian big integer with a 32-bit byte count.
pub const LARGE_BIG_EXT: u8 = 111;
/// A new-style reference with up to three id words.
pub const NEW_REFERENCE_EXT: u8 = 114;
/// A float as 8 bytes of IEEE-754 binary64.
pub const NEW_FLOAT_EXT: u8 = 70;

impl Term {
    /// Encodes this term, optionally preceded by the version magic.
    pub fn encode(&self, with_version: bool) -> Result<Vec<u8>, TermError> {
        let mut buf = Buffer::new();
        encode_term(self, &mut buf, with_version)?;
        Ok(buf.into_vec())
    }

    /// Decodes one term from `bytes`, consuming a leading version magic
    /// if present.
    pub fn decode(bytes: &[u8]) -> Result<Term, TermError> {
        let mut buf = Buffer::from_slice(bytes);
        decode_term(&mut buf)
    }
}

/// Encodes `term` into `buf`, optionally preceded by the version magic.
pub fn encode_term(term: &Term, buf: &mut Buffer, with_version: bool) -> Result<(), TermError> {
    if with_version {
        buf.write_u8(VERSION_MAGIC);
    }
    encode_inner(term, buf)
}

/// Decodes one term from `buf`, consuming a leading version magic if
/// present.
pub fn decode_term(buf: &mut Buffer) -> Result<Term, TermError> {
    if buf.peek_u8(0) == Some(VERSION_MAGIC) {
        buf.read_u8()?;
    }
    decode_inner(buf)
}

/// Peeks at the pending term without consuming input.
///
/// Returns the type tag and its size: the byte length for atoms,
/// strings and binaries, the arity for tuples and lists, the magnitude
/// byte count for big integers, and 0 for fixed-size terms. A leading
/// version magic is skipped.
pub fn peek_type(buf: &Buffer) -> Result<(u8, usize), TermError> {
    let mut at = 0;
    let mut tag = buf
        .peek_u8(at)
        .ok_or_else(|| buf.decode_error(DecodeReason::ShortBuffer))?;
    if tag == VERSION_MAGIC {
        at = 1;
        tag = buf
            .peek_u8(at)
            .ok_or_else(|| buf.decode_error(DecodeReason::ShortBuffer))?;
    }
    let size = match tag {
        ATOM_EXT | STRING_EXT => peek_u16(buf, at + 1)? as usize,
        BINARY_EXT | LARGE_TUPLE_EXT | LIST_EXT => peek_u32(buf, at + 1)? as usize,
        SMALL_TUPLE_EXT | SMALL_BIG_EXT => buf
            .peek_u8(at + 1)
            .ok_or_else(|| buf.decode_error(DecodeReason::ShortBuffer))?
            as usize,
        LARGE_BIG_EXT => peek_u32(buf, at + 1)? as usize,
        NEW_REFERENCE_EXT => peek_u16(buf, at + 1)? as usize,
        SMALL_INTEGER_EXT | INTEGER_EXT | FLOAT_EXT | NEW_FLOAT_EXT | NIL_EXT
        | REFERENCE_EXT | PORT_EXT | PID_EXT => 0,
        other => return Err(buf.decode_error(DecodeReason::UnknownTag(other))),
    };
    Ok((tag, size))
}

fn peek_u16(buf: &Buffer, at: usize) -> Result<u16, TermError> {
    let hi = buf.peek_u8(at);
    let lo = buf.peek_u8(at + 1);
    match (hi, lo) {
        (Some(hi), Some(lo)) => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(buf.decode_error(DecodeReason::ShortBuffer)),
    }
}

fn peek_u32(buf: &Buffer, at: usize) -> Result<u32, TermError> {
    let mut bytes = [0u8; 4];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = buf
            .peek_u8(at + i)
            .ok_or_else(|| buf.decode_error(DecodeReason::ShortBuffer))?;
    }
    Ok(u32::from_be_bytes(bytes))
}

fn encode_inner(term: &Term, buf: &mut Buffer) -> Result<(), TermError> {
    match term {
        Term::Atom(a) => {
            encode_atom(buf, a.name());
            Ok(())
        }
        Term::Long(v) => {
            encode_long(buf, *v);
            Ok(())
        }
        Term::Double(v) => {
            buf.write_u8(NEW_FLOAT_EXT);
            buf.write_bytes(&v.to_bits().to_be_bytes());
            Ok(())
        }
        Term::String(s) => {
            let bytes = s.as_bytes();
            if bytes.len() <= u16::MAX as usize {
                buf.write_u8(STRING_EXT);
                buf.write_u16_be(bytes.len() as u16);
                buf.write_bytes(bytes);
            } else {
                // Too long for the compact form: a list of small
                // integers with a nil tail.
                buf.write_u8(LIST_EXT);
                buf.write_u32_be(bytes.len() as u32);
                for b in bytes {
                    buf.write_u8(SMALL_INTEGER_EXT);
                    buf.write_u8(*b);
                }
                buf.write_u8(NIL_EXT);
            }
            Ok(())
        }
        Term::Binary(bytes) => {
            buf.write_u8(BINARY_EXT);
            buf.write_u32_be(bytes.len() as u32);
            buf.write_bytes(bytes);
            Ok(())
        }
        Term::Pid(p) => {
            buf.write_u8(PID_EXT);
            encode_atom(buf, p.node());
            buf.write_u32_be(p.id());
            buf.write_u32_be(p.serial());
            buf.write_u8(p.creation() & 0x03);
            Ok(())
        }
        Term::Port(p) => {
            buf.write_u8(PORT_EXT);
            encode_atom(buf, p.node());
            buf.write_u32_be(p.id());
            buf.write_u8(p.creation() & 0x03);
            Ok(())
        }
        Term::Ref(r) => {
            if r.is_new_style() {
                buf.write_u8(NEW_REFERENCE_EXT);
                buf.write_u16_be(r.count() as u16);
                encode_atom(buf, r.node());
                buf.write_u8(r.creation() & 0x03);
                for id in &r.ids()[..r.count() as usize] {
                    buf.write_u32_be(*id);
                }
            } else {
                buf.write_u8(REFERENCE_EXT);
                encode_atom(buf, r.node());
                buf.write_u32_be(r.ids()[0]);
                buf.write_u8(r.creation() & 0x03);
            }
            Ok(())
        }
        Term::Tuple(t) => {
            if t.arity() <= u8::MAX as usize {
                buf.write_u8(SMALL_TUPLE_EXT);
                buf.write_u8(t.arity() as u8);
            } else {
                buf.write_u8(LARGE_TUPLE_EXT);
                buf.write_u32_be(t.arity() as u32);
            }
            for elem in t.elements() {
                encode_inner(elem, buf)?;
            }
            Ok(())
        }
        Term::EmptyList => {
            buf.write_u8(NIL_EXT);
            Ok(())
        }
        Term::List(l) => {
            buf.write_u8(LIST_EXT);
            buf.write_u32_be(l.arity() as u32);
            for elem in l.elements() {
                encode_inner(elem, buf)?;
            }
            encode_inner(l.tail(), buf)
        }
        Term::Variable(v) => Err(TermError::Encode(format!(
            "variable '{}' has no external representation",
            v.name()
        ))),
    }
}

fn encode_atom(buf: &mut Buffer, name: &str) {
    buf.write_u8(ATOM_EXT);
    buf.write_u16_be(name.len() as u16);
    buf.write_bytes(name.as_bytes());
}

/// Integers take the smallest form that holds them.
fn encode_long(buf: &mut Buffer, v: i64) {
    if (0..=255).contains(&v) {
        buf.write_u8(SMALL_INTEGER_EXT);
        buf.write_u8(v as u8);
    } else if (i32::MIN as i64..=i32::MAX as i64).contains(&v) {
        buf.write_u8(INTEGER_EXT);
        buf.write_bytes(&(v as i32).to_be_bytes());
    } else {
        let magnitude = v.unsigned_abs();
        let bytes = magnitude.to_le_bytes();
        let n = 8 - magnitude.leading_zeros() as usize / 8;
        buf.write_u8(SMALL_BIG_EXT);
        buf.write_u8(n as u8);
        buf.write_u8(u8::from(v < 0));
        buf.write_bytes(&bytes[..n]);
    }
}

fn decode_inner(buf: &mut Buffer) -> Result<Term, TermError> {
    let start = buf.read_position();
    let tag = buf.read_u8()?;
    match tag {
        SMALL_INTEGER_EXT => Ok(Term::Long(buf.read_u8()? as i64)),
        INTEGER_EXT => Ok(Term::Long(buf.read_u32_be()? as i32 as i64)),
        SMALL_BIG_EXT => {
            let n = buf.read_u8()? as u32;
            decode_big(buf, n, start)
        }
        LARGE_BIG_EXT => {
            let n = buf.read_u32_be()?;
            decode_big(buf, n, start)
        }
        FLOAT_EXT => {
            let text = buf.read_slice(31)?;
            let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
            let parsed = std::str::from_utf8(&text[..end])
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok());
            match parsed {
                Some(v) => Ok(Term::Double(v)),
                None => Err(TermError::Decode {
                    offset: start,
                    reason: DecodeReason::BadFloatText,
                }),
            }
        }
        NEW_FLOAT_EXT => {
            let raw = buf.read_slice(8)?;
            let mut bits = [0u8; 8];
            bits.copy_from_slice(raw);
            Ok(Term::Double(f64::from_bits(u64::from_be_bytes(bits))))
        }
        ATOM_EXT => {
            let name = decode_atom_body(buf, start)?;
            Ok(Term::Atom(crate::term::Atom::new(name).map_err(|_| {
                TermError::Decode {
                    offset: start,
                    reason: DecodeReason::CountOutOfRange(0),
                }
            })?))
        }
        SMALL_TUPLE_EXT | LARGE_TUPLE_EXT => {
            let arity = if tag == SMALL_TUPLE_EXT {
                buf.read_u8()? as usize
            } else {
                buf.read_u32_be()? as usize
            };
            let mut tuple = TupleBuilder::with_arity(arity);
            for _ in 0..arity {
                tuple.push(decode_inner(buf)?)?;
            }
            Ok(Term::Tuple(tuple.seal()?))
        }
        NIL_EXT => Ok(Term::EmptyList),
        STRING_EXT => {
            let len = buf.read_u16_be()? as usize;
            let bytes = buf.read_slice(len)?.to_vec();
            Ok(materialize_string(bytes))
        }
        LIST_EXT => {
            let arity = buf.read_u32_be()?;
            if arity == 0 {
                // Degenerate form: no head elements, just the tail.
                return decode_inner(buf);
            }
            // Character lists beyond the compact string form arrive as
            // LIST_EXT; shorter small-integer lists are genuine lists.
            if arity as usize > u16::MAX as usize {
                if let Some(term) = try_decode_char_list(buf, arity) {
                    return Ok(term);
                }
            }
            let mut list = ListBuilder::with_arity(arity as usize);
            for _ in 0..arity {
                list.push(decode_inner(buf)?)?;
            }
            let tail = decode_inner(buf)?;
            Ok(Term::List(list.close(tail)?))
        }
        BINARY_EXT => {
            let len = buf.read_u32_be()? as usize;
            Ok(Term::Binary(buf.read_slice(len)?.to_vec()))
        }
        PID_EXT => {
            let node = decode_node_atom(buf)?;
            let id = buf.read_u32_be()?;
            let serial = buf.read_u32_be()?;
            let creation = buf.read_u8()? & 0x03;
            Ok(Term::Pid(Pid {
                node,
                id,
                serial,
                creation,
            }))
        }
        PORT_EXT => {
            let node = decode_node_atom(buf)?;
            let id = buf.read_u32_be()?;
            let creation = buf.read_u8()? & 0x03;
            Ok(Term::Port(Port { node, id, creation }))
        }
        REFERENCE_EXT => {
            let node = decode_node_atom(buf)?;
            let id = buf.read_u32_be()?;
            let creation = buf.read_u8()?;
            Ok(Term::Ref(Ref::from_wire(node, [id, 0, 0], 1, creation, false)))
        }
        NEW_REFERENCE_EXT => {
            let count = buf.read_u16_be()?;
            if count == 0 || count > 3 {
                return Err(TermError::Decode {
                    offset: start,
                    reason: DecodeReason::CountOutOfRange(count as u32),
                });
            }
            let node = decode_node_atom(buf)?;
            let creation = buf.read_u8()?;
            let mut ids = [0u32; 3];
            for id in ids.iter_mut().take(count as usize) {
                *id = buf.read_u32_be()?;
            }
            Ok(Term::Ref(Ref::from_wire(
                node,
                ids,
                count as u8,
                creation,
                true,
            )))
        }
        other => Err(TermError::Decode {
            offset: start,
            reason: DecodeReason::UnknownTag(other),
        }),
    }
}

fn decode_big(buf: &mut Buffer, n: u32, start: usize) -> Result<Term, TermError> {
    if n > 8 {
        return Err(TermError::Decode {
            offset: start,
            reason: DecodeReason::IntegerOverflow(n),
        });
    }
    let negative = buf.read_u8()? != 0;
    let bytes = buf.read_slice(n as usize)?;
    let mut magnitude = [0u8; 8];
    magnitude[..n as usize].copy_from_slice(bytes);
    let magnitude = u64::from_le_bytes(magnitude);

    let limit = if negative {
        i64::MAX as u64 + 1
    } else {
        i64::MAX as u64
    };
    if magnitude > limit {
        return Err(TermError::Decode {
            offset: start,
            reason: DecodeReason::IntegerOverflow(n),
        });
    }
    let value = if negative {
        (-(magnitude as i128)) as i64
    } else {
        magnitude as i64
    };
    Ok(Term::Long(value))
}

fn decode_atom_body(buf: &mut Buffer, start: usize) -> Result<String, TermError> {
    let len = buf.read_u16_be()?;
    if len == 0 || len as usize > crate::term::MAX_ATOM_LENGTH {
        return Err(TermError::Decode {
            offset: start,
            reason: DecodeReason::CountOutOfRange(len as u32),
        });
    }
    let bytes = buf.read_slice(len as usize)?.to_vec();
    String::from_utf8(bytes).map_err(|_| TermError::Decode {
        offset: start,
        reason: DecodeReason::InvalidUtf8,
    })
}

fn decode_node_atom(buf: &mut Buffer) -> Result<String, TermError> {
    let start = buf.read_position();
    let tag = buf.read_u8()?;
    if tag != ATOM_EXT {
        return Err(TermError::Decode {
            offset: start,
            reason: DecodeReason::NodeNotAtom(tag),
        });
    }
    decode_atom_body(buf, start)
}

/// Character lists arrive as LIST_EXT when they outgrow the compact
/// string form. When every element is a small integer and the tail is
/// nil, materialize the list back into a string.
fn try_decode_char_list(buf: &mut Buffer, arity: u32) -> Option<Term> {
    let arity = arity as usize;
    let mut bytes = Vec::with_capacity(arity);
    for i in 0..arity {
        if buf.peek_u8(2 * i)? != SMALL_INTEGER_EXT {
            return None;
        }
        bytes.push(buf.peek_u8(2 * i + 1)?);
    }
    if buf.peek_u8(2 * arity)? != NIL_EXT {
        return None;
    }
    let text = String::from_utf8(bytes).ok()?;
    // Committed: consume the elements and the tail.
    buf.read_slice(2 * arity + 1)
        .expect("peeked bytes must be readable");
    Some(Term::String(text))
}

fn materialize_string(bytes: Vec<u8>) -> Term {
    match String::from_utf8(bytes) {
        Ok(text) => Term::String(text),
        // Not renderable as text: keep the wire meaning, a list of
        // small integers.
        Err(err) => Term::list(
            err.into_bytes()
                .into_iter()
                .map(|b| Term::Long(b as i64))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::List;

    fn roundtrip(term: &Term) {
        let bytes = term.encode(true).unwrap();
        assert_eq!(&Term::decode(&bytes).unwrap(), term);
        let bytes = term.encode(false).unwrap();
        assert_eq!(&Term::decode(&bytes).unwrap(), term);
    }

    #[test]
    fn atom_wire_form() {
        let atom = Term::atom("hello").unwrap();
        let bytes = atom.encode(true).unwrap();
        assert_eq!(bytes, [131, 100, 0, 5, b'h', b'e', b'l', b'l', b'o']);
        let decoded = Term::decode(&bytes).unwrap();
        assert_eq!(decoded.atom_value(), Some("hello"));
    }

    #[test]
    fn tuple_of_pid_and_atom() {
        let term = Term::tuple(vec![
            Term::Pid(Pid::new("a@h", 1, 0, 0).unwrap()),
            Term::atom("hello").unwrap(),
        ]);
        roundtrip(&term);
    }

    #[test]
    fn long_list_header_and_roundtrip() {
        let elems: Vec<Term> = (0..100).map(|i| Term::Long(1000 + i)).collect();
        let term = Term::list(elems);
        let bytes = term.encode(true).unwrap();
        assert_eq!(bytes[1], LIST_EXT);
        assert_eq!(&bytes[2..6], &100u32.to_be_bytes()[..]);
        let decoded = Term::decode(&bytes).unwrap();
        assert_eq!(decoded, term);
        assert!(decoded.is_proper_list());
    }

    #[test]
    fn integers_take_smallest_form() {
        assert_eq!(Term::Long(7).encode(false).unwrap(), [SMALL_INTEGER_EXT, 7]);
        assert_eq!(
            Term::Long(-1).encode(false).unwrap(),
            [INTEGER_EXT, 0xff, 0xff, 0xff, 0xff]
        );
        let big = Term::Long(1 << 40).encode(false).unwrap();
        assert_eq!(big[0], SMALL_BIG_EXT);
        roundtrip(&Term::Long(i64::MAX));
        roundtrip(&Term::Long(i64::MIN));
        roundtrip(&Term::Long(0));
        roundtrip(&Term::Long(-(1 << 40)));
    }

    #[test]
    fn big_integer_overflow_detected() {
        // 9-byte magnitude cannot fit a 64-bit integer
        let bytes = [SMALL_BIG_EXT, 9, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let err = Term::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            TermError::Decode {
                reason: DecodeReason::IntegerOverflow(9),
                ..
            }
        ));
        // 2^63 is out of range positive, in range negative
        let too_big = [SMALL_BIG_EXT, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0x80];
        assert!(Term::decode(&too_big).is_err());
        let min = [SMALL_BIG_EXT, 8, 1, 0, 0, 0, 0, 0, 0, 0, 0x80];
        assert_eq!(Term::decode(&min).unwrap(), Term::Long(i64::MIN));
    }

    #[test]
    fn floats_decode_from_both_forms() {
        roundtrip(&Term::Double(3.25));
        roundtrip(&Term::Double(-0.0));

        // 31-byte text form
        let mut bytes = vec![FLOAT_EXT];
        let mut text = format!("{:.20e}", 1.5f64).into_bytes();
        text.resize(31, 0);
        bytes.extend_from_slice(&text);
        assert_eq!(Term::decode(&bytes).unwrap(), Term::Double(1.5));
    }

    #[test]
    fn string_forms() {
        roundtrip(&Term::string("hello world"));
        roundtrip(&Term::string(""));

        // Oversized strings fall back to a character list and decode
        // back to a string.
        let long = "x".repeat(70_000);
        let bytes = Term::string(long.clone()).encode(false).unwrap();
        assert_eq!(bytes[0], LIST_EXT);
        assert_eq!(Term::decode(&bytes).unwrap(), Term::string(long));
    }

    #[test]
    fn char_list_fast_path_requires_nil_tail() {
        // [104, 105 | 7] must stay an improper list
        let term = Term::List(List::with_tail(
            vec![Term::Long(104), Term::Long(105)],
            Term::Long(7),
        ));
        roundtrip(&term);
    }

    #[test]
    fn non_utf8_string_becomes_small_int_list() {
        let bytes = [STRING_EXT, 0, 2, 0xff, 0xfe];
        let decoded = Term::decode(&bytes).unwrap();
        assert_eq!(
            decoded,
            Term::list(vec![Term::Long(0xff), Term::Long(0xfe)])
        );
    }

    #[test]
    fn refs_roundtrip_both_styles() {
        roundtrip(&Term::Ref(Ref::new("n@h", [1, 2, 3], 1).unwrap()));
        roundtrip(&Term::Ref(Ref::old_style("n@h", 42, 2).unwrap()));
        roundtrip(&Term::Port(Port::new("n@h", 9, 1).unwrap()));
    }

    #[test]
    fn ref_count_out_of_range() {
        let mut bytes = vec![NEW_REFERENCE_EXT, 0, 4];
        bytes.extend_from_slice(&[ATOM_EXT, 0, 1, b'n', 0]);
        bytes.extend_from_slice(&[0; 16]);
        let err = Term::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            TermError::Decode {
                reason: DecodeReason::CountOutOfRange(4),
                ..
            }
        ));
    }

    #[test]
    fn unknown_tag_reports_offset() {
        let term = Term::tuple(vec![Term::Long(1)]);
        let mut bytes = term.encode(true).unwrap();
        bytes[3] = 0xee; // corrupt the element tag
        let err = Term::decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            TermError::Decode {
                offset: 3,
                reason: DecodeReason::UnknownTag(0xee)
            }
        );
    }

    #[test]
    fn short_buffer_is_an_error() {
        let bytes = Term::tuple(vec![Term::Long(300)]).encode(true).unwrap();
        let err = Term::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            TermError::Decode {
                reason: DecodeReason::ShortBuffer,
                ..
            }
        ));
    }

    #[test]
    fn variables_do_not_encode() {
        assert!(matches!(
            Term::var("X").encode(false),
            Err(TermError::Encode(_))
        ));
    }

    #[test]
    fn peek_type_reports_tag_and_size() {
        let bytes = Term::atom("abc").unwrap().encode(true).unwrap();
        let buf = Buffer::from_slice(&bytes);
        assert_eq!(peek_type(&buf).unwrap(), (ATOM_EXT, 3));

        let bytes = Term::tuple(vec![Term::Long(1), Term::Long(2)])
            .encode(false)
            .unwrap();
        let buf = Buffer::from_slice(&bytes);
        assert_eq!(peek_type(&buf).unwrap(), (SMALL_TUPLE_EXT, 2));
    }

    #[test]
    fn nested_structures_roundtrip() {
        let term = Term::tuple(vec![
            Term::atom("call").unwrap(),
            Term::list(vec![
                Term::Long(1),
                Term::tuple(vec![Term::binary(vec![0, 1, 2]), Term::Double(2.5)]),
                Term::string("payload"),
            ]),
            Term::List(List::with_tail(
                vec![Term::Long(300)],
                Term::atom("tail").unwrap(),
            )),
            Term::EmptyList,
        ]);
        roundtrip(&term);
    }

    #[test]
    fn empty_list_encodes_as_nil() {
        assert_eq!(Term::EmptyList.encode(false).unwrap(), [NIL_EXT]);
        assert_eq!(Term::decode(&[NIL_EXT]).unwrap(), Term::EmptyList);
    }
}
