use std::io::{self, ErrorKind, Read};
use std::iter::FusedIterator;
use std::str;

use num_bigint::BigInt;

use super::opcode::{ArgKind, Opcode};
use crate::error::DecodeError;

/// Decoded inline argument of an opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    None,
    Int(BigInt),
    Bool(bool),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Pair(String, String),
}

impl Arg {
    /// The integer value carried by this argument, if any.
    /// Protocol 0 booleans (`I00`/`I01`) count as 0 and 1.
    pub fn into_int(self) -> Option<BigInt> {
        match self {
            Arg::Int(value) => Some(value),
            Arg::Bool(flag) => Some(BigInt::from(u8::from(flag))),
            _ => None,
        }
    }
}

/// One decoded instruction. `pos` is the opcode's byte offset relative to
/// where decoding started.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub arg: Arg,
    pub pos: u64,
}

pub type Instructions<'r> = Box<dyn Iterator<Item = Result<Instruction, DecodeError>> + 'r>;

/// Turns a byte stream into a lazy, finite, non-restartable instruction
/// sequence. Malformed input surfaces as an `Err` item, after which the
/// sequence ends.
pub trait OpcodeDecoder {
    fn decode<'r, R: Read + ?Sized + 'r>(&self, reader: &'r mut R) -> Instructions<'r>;
}

/// The pickle implementation of [`OpcodeDecoder`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PickleDecoder;

impl OpcodeDecoder for PickleDecoder {
    fn decode<'r, R: Read + ?Sized + 'r>(&self, reader: &'r mut R) -> Instructions<'r> {
        Box::new(Genops::new(reader))
    }
}

pub fn genops<R: Read>(reader: R) -> Genops<R> {
    Genops::new(reader)
}

/// Iterator over the opcodes of a single pickle, ending after `STOP`.
///
/// Reads one byte at a time for opcodes and line arguments, so it never
/// consumes past the `STOP` opcode.
pub struct Genops<R> {
    reader: R,
    pos: u64,
    finished: bool,
}

impl<R: Read> Genops<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pos: 0,
            finished: false,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn step(&mut self) -> Result<Instruction, DecodeError> {
        let pos = self.pos;
        let code = self.read_byte()?.ok_or(DecodeError::Exhausted)?;
        let opcode = Opcode::from_code(code).ok_or(DecodeError::UnknownOpcode { pos, code })?;
        let arg = self.read_arg(opcode, pos)?;
        Ok(Instruction { opcode, arg, pos })
    }

    fn read_arg(&mut self, op: Opcode, at: u64) -> Result<Arg, DecodeError> {
        let arg = match op.arg_kind() {
            ArgKind::None => Arg::None,
            ArgKind::Uint1 => Arg::Int(self.read_fixed::<1>(op, at, "uint1")?[0].into()),
            ArgKind::Uint2 => Arg::Int(u16::from_le_bytes(self.read_fixed(op, at, "uint2")?).into()),
            ArgKind::Int4 => Arg::Int(i32::from_le_bytes(self.read_fixed(op, at, "int4")?).into()),
            ArgKind::Uint4 => Arg::Int(u32::from_le_bytes(self.read_fixed(op, at, "uint4")?).into()),
            ArgKind::Uint8 => Arg::Int(u64::from_le_bytes(self.read_fixed(op, at, "uint8")?).into()),
            ArgKind::Long1 => {
                let n = self.read_fixed::<1>(op, at, "long1")?[0];
                let bytes = self.read_counted(u64::from(n), op, at, "long1")?;
                Arg::Int(BigInt::from_signed_bytes_le(&bytes))
            }
            ArgKind::Long4 => {
                let n = self.read_signed_count(op, at, "long4")?;
                let bytes = self.read_counted(n, op, at, "long4")?;
                Arg::Int(BigInt::from_signed_bytes_le(&bytes))
            }
            ArgKind::String1 | ArgKind::Bytes1 => {
                let n = self.read_fixed::<1>(op, at, "bytes1")?[0];
                Arg::Bytes(self.read_counted(u64::from(n), op, at, "bytes1")?)
            }
            ArgKind::String4 => {
                let n = self.read_signed_count(op, at, "string4")?;
                Arg::Bytes(self.read_counted(n, op, at, "string4")?)
            }
            ArgKind::Bytes4 => {
                let n = u32::from_le_bytes(self.read_fixed(op, at, "bytes4")?);
                Arg::Bytes(self.read_counted(u64::from(n), op, at, "bytes4")?)
            }
            ArgKind::Bytes8 | ArgKind::Bytearray8 => {
                let n = u64::from_le_bytes(self.read_fixed(op, at, "bytes8")?);
                Arg::Bytes(self.read_counted(n, op, at, "bytes8")?)
            }
            ArgKind::Unicode1 => {
                let n = self.read_fixed::<1>(op, at, "unicodestring1")?[0];
                let bytes = self.read_counted(u64::from(n), op, at, "unicodestring1")?;
                Arg::Text(utf8(bytes, op, at)?)
            }
            ArgKind::Unicode4 => {
                let n = u32::from_le_bytes(self.read_fixed(op, at, "unicodestring4")?);
                let bytes = self.read_counted(u64::from(n), op, at, "unicodestring4")?;
                Arg::Text(utf8(bytes, op, at)?)
            }
            ArgKind::Unicode8 => {
                let n = u64::from_le_bytes(self.read_fixed(op, at, "unicodestring8")?);
                let bytes = self.read_counted(n, op, at, "unicodestring8")?;
                Arg::Text(utf8(bytes, op, at)?)
            }
            ArgKind::DecimalNlShort => {
                let line = self.read_line(op, at, "decimalnl_short")?;
                match line.as_slice() {
                    b"00" => Arg::Bool(false),
                    b"01" => Arg::Bool(true),
                    digits => Arg::Int(parse_int(digits, op, at)?),
                }
            }
            ArgKind::DecimalNlLong => {
                let mut line = self.read_line(op, at, "decimalnl_long")?;
                if line.last() == Some(&b'L') {
                    line.pop();
                }
                Arg::Int(parse_int(&line, op, at)?)
            }
            ArgKind::FloatNl => {
                let line = self.read_line(op, at, "floatnl")?;
                let value = str::from_utf8(&line)
                    .ok()
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .ok_or_else(|| bad(op, at, format!("invalid float literal {}", escape(&line))))?;
                Arg::Float(value)
            }
            ArgKind::Float8 => Arg::Float(f64::from_be_bytes(self.read_fixed(op, at, "float8")?)),
            ArgKind::StringNl => {
                let line = self.read_line(op, at, "stringnl")?;
                let quoted = strip_quotes(line, op, at)?;
                Arg::Bytes(escape_decode(&quoted).map_err(|reason| bad(op, at, reason))?)
            }
            ArgKind::StringNlNoescape => {
                let line = self.read_line(op, at, "stringnl_noescape")?;
                Arg::Text(escaped_utf8(&line, op, at)?)
            }
            ArgKind::StringNlNoescapePair => {
                let module = self.read_line(op, at, "stringnl_noescape_pair")?;
                let name = self.read_line(op, at, "stringnl_noescape_pair")?;
                Arg::Pair(escaped_utf8(&module, op, at)?, escaped_utf8(&name, op, at)?)
            }
            ArgKind::UnicodeNl => {
                let line = self.read_line(op, at, "unicodestringnl")?;
                let text = decode_raw_unicode_escape(&line)
                    .ok_or_else(|| bad(op, at, "truncated \\uXXXX escape".to_string()))?;
                Arg::Text(text)
            }
        };
        Ok(arg)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.pos += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_fixed<const N: usize>(
        &mut self,
        op: Opcode,
        at: u64,
        what: &str,
    ) -> Result<[u8; N], DecodeError> {
        let mut buf = [0u8; N];
        for slot in buf.iter_mut() {
            *slot = self
                .read_byte()?
                .ok_or_else(|| bad(op, at, format!("not enough data in stream to read {what}")))?;
        }
        Ok(buf)
    }

    /// Length prefix stored as a signed `int4`; negative counts are invalid.
    fn read_signed_count(&mut self, op: Opcode, at: u64, what: &str) -> Result<u64, DecodeError> {
        let n = i32::from_le_bytes(self.read_fixed(op, at, what)?);
        u64::try_from(n).map_err(|_| bad(op, at, format!("{what} byte count < 0: {n}")))
    }

    /// Read exactly `n` bytes. The buffer grows with the data actually
    /// present, never with the declared count.
    fn read_counted(
        &mut self,
        n: u64,
        op: Opcode,
        at: u64,
        what: &str,
    ) -> Result<Vec<u8>, DecodeError> {
        let mut buf = Vec::new();
        (&mut self.reader).take(n).read_to_end(&mut buf)?;
        self.pos += buf.len() as u64;
        if (buf.len() as u64) < n {
            return Err(bad(
                op,
                at,
                format!("expected {n} bytes in a {what}, but only {} remain", buf.len()),
            ));
        }
        Ok(buf)
    }

    /// Newline-terminated line, without the newline.
    fn read_line(&mut self, op: Opcode, at: u64, what: &str) -> Result<Vec<u8>, DecodeError> {
        let mut line = Vec::new();
        loop {
            match self.read_byte()? {
                Some(b'\n') => return Ok(line),
                Some(byte) => line.push(byte),
                None => {
                    return Err(bad(
                        op,
                        at,
                        format!("no newline found when trying to read {what}"),
                    ))
                }
            }
        }
    }
}

impl<R: Read> Iterator for Genops<R> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.step();
        self.finished = match &item {
            Ok(instruction) => instruction.opcode == Opcode::Stop,
            Err(_) => true,
        };
        Some(item)
    }
}

impl<R: Read> FusedIterator for Genops<R> {}

fn bad(opcode: Opcode, pos: u64, reason: String) -> DecodeError {
    DecodeError::BadArgument {
        pos,
        opcode: opcode.name(),
        reason,
    }
}

fn escape(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

fn utf8(bytes: Vec<u8>, op: Opcode, at: u64) -> Result<String, DecodeError> {
    String::from_utf8(bytes).map_err(|e| bad(op, at, format!("invalid UTF-8: {e}")))
}

/// Decimal integer with optional sign, surrounding whitespace and `_`
/// digit separators.
fn parse_int(digits: &[u8], op: Opcode, at: u64) -> Result<BigInt, DecodeError> {
    str::from_utf8(digits)
        .ok()
        .and_then(|s| BigInt::parse_bytes(s.trim().as_bytes(), 10))
        .ok_or_else(|| bad(op, at, format!("invalid integer literal {}", escape(digits))))
}

/// Escape-decoded line read as UTF-8, the form module and attribute names
/// take in `GLOBAL`, `INST` and `PERSID`.
fn escaped_utf8(line: &[u8], op: Opcode, at: u64) -> Result<String, DecodeError> {
    let bytes = escape_decode(line).map_err(|reason| bad(op, at, reason))?;
    utf8(bytes, op, at)
}

/// Quoted `STRING` body, quotes removed. Escapes are resolved afterwards by
/// [`escape_decode`]; the resulting bytes are the latin-1 text of the
/// string, so no further decoding can fail.
fn strip_quotes(line: Vec<u8>, op: Opcode, at: u64) -> Result<Vec<u8>, DecodeError> {
    for quote in [b'"', b'\''] {
        if line.first() == Some(&quote) {
            if line.last() != Some(&quote) {
                return Err(bad(
                    op,
                    at,
                    format!("string quote {} not found at both ends of {}", quote as char, escape(&line)),
                ));
            }
            return Ok(line.get(1..line.len() - 1).unwrap_or_default().to_vec());
        }
    }
    Err(bad(op, at, format!("no string quotes around {}", escape(&line))))
}

/// Resolve backslash escapes the way a Python bytes literal does.
///
/// Unknown escapes such as `\q` are kept verbatim. A dangling backslash or a
/// `\x` not followed by two hex digits is an error.
fn escape_decode(input: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let byte = input[i];
        i += 1;
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        let Some(&next) = input.get(i) else {
            return Err("Trailing \\ in string".to_string());
        };
        i += 1;
        match next {
            b'\n' => {}
            b'\\' | b'\'' | b'"' => out.push(next),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                for _ in 0..2 {
                    match input.get(i) {
                        Some(&digit @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(digit - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            b'x' => {
                let hex = input
                    .get(i..i + 2)
                    .filter(|digits| digits.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|digits| str::from_utf8(digits).ok())
                    .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                    .ok_or_else(|| format!("invalid \\x escape at position {}", i - 2))?;
                out.push(hex);
                i += 2;
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

/// Latin-1 text where `\uXXXX` and `\UXXXXXXXX` denote code points.
fn decode_raw_unicode_escape(bytes: &[u8]) -> Option<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let width = match (bytes[i], bytes.get(i + 1)) {
            (b'\\', Some(b'u')) => 4,
            (b'\\', Some(b'U')) => 8,
            (byte, _) => {
                out.push(char::from(byte));
                i += 1;
                continue;
            }
        };
        let hex = bytes.get(i + 2..i + 2 + width)?;
        let code = u32::from_str_radix(str::from_utf8(hex).ok()?, 16).ok()?;
        out.push(char::from_u32(code)?);
        i += 2 + width;
    }
    Some(out)
}
