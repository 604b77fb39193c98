//! Stream filters.
//!
//! Every decoder reports how many input bytes it consumed. Inline images have
//! no `/Length`, so the content parser relies on that count to find where the
//! image data ends.

use crate::error::*;
use crate::primitive::{Primitive, Dictionary, Name};

use std::borrow::Cow;
use std::cell::Cell;
use std::io::Read;
use deflate::deflate_bytes_zlib;

#[derive(Debug, Clone, PartialEq)]
pub struct LZWFlateParams {
    pub predictor: i32,
    pub n_components: i32,
    pub bits_per_component: i32,
    pub columns: i32,
    pub early_change: i32,
}
impl Default for LZWFlateParams {
    fn default() -> LZWFlateParams {
        LZWFlateParams {
            predictor: 1,
            n_components: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: 1
        }
    }
}
impl LZWFlateParams {
    pub fn from_dict(params: Option<&Dictionary>) -> LZWFlateParams {
        LZWFlateParams {
            predictor: int_param(params, "Predictor", 1),
            n_components: int_param(params, "Colors", 1),
            bits_per_component: int_param(params, "BitsPerComponent", 8),
            columns: int_param(params, "Columns", 1),
            early_change: int_param(params, "EarlyChange", 1),
        }
    }

    /// (bytes per pixel, bytes per row), or `None` if the geometry is unusable
    /// or a single row would exceed `limit`.
    fn geometry(&self, limit: usize) -> Option<(usize, usize)> {
        let colors: usize = self.n_components.try_into().ok().filter(|&n| n > 0)?;
        let bpc: usize = self.bits_per_component.try_into().ok().filter(|&n| matches!(n, 1 | 2 | 4 | 8 | 16))?;
        let columns: usize = self.columns.try_into().ok().filter(|&n| n > 0)?;
        let pixel_bits = colors.checked_mul(bpc)?;
        let row_bits = pixel_bits.checked_mul(columns)?;
        let row_len = row_bits.checked_add(7)? / 8;
        if row_len > limit {
            return None;
        }
        Some(((pixel_bits + 7) / 8, row_len))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DCTDecodeParams {
    // The default depends on the number of components in the image.
    pub color_transform: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CCITTFaxDecodeParams {
    /// < 0: group 4, 0: group 3 one-dimensional, > 0: group 3 mixed.
    pub k: i32,
    pub columns: u32,
    /// 0 if unknown.
    pub rows: u32,
    pub black_is_1: bool,
    pub encoded_byte_align: bool,
}
impl Default for CCITTFaxDecodeParams {
    fn default() -> Self {
        CCITTFaxDecodeParams {
            k: 0,
            columns: 1728,
            rows: 0,
            black_is_1: false,
            encoded_byte_align: false,
        }
    }
}
impl CCITTFaxDecodeParams {
    pub fn from_dict(params: Option<&Dictionary>) -> Self {
        let bool_param = |key| params
            .and_then(|p| p.get(key))
            .and_then(|p| p.as_bool().ok())
            .unwrap_or(false);
        let rows = int_param(params, "Rows", 0);
        CCITTFaxDecodeParams {
            k: int_param(params, "K", 0),
            columns: int_param(params, "Columns", 1728).max(0) as u32,
            rows: if (0 ..= u16::MAX as i32).contains(&rows) { rows as u32 } else { 0 },
            black_is_1: bool_param("BlackIs1"),
            encoded_byte_align: bool_param("EncodedByteAlign"),
        }
    }
}

fn int_param(params: Option<&Dictionary>, key: &str, default: i32) -> i32 {
    params
        .and_then(|p| p.get(key))
        .and_then(|p| p.as_integer().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFilter {
    ASCIIHexDecode,
    ASCII85Decode,
    RunLengthDecode,
    LZWDecode (LZWFlateParams),
    FlateDecode (LZWFlateParams),
    JPXDecode, //Jpeg2k
    JBIG2Decode,
    DCTDecode (DCTDecodeParams),
    CCITTFaxDecode (CCITTFaxDecodeParams),
    Crypt
}
impl StreamFilter {
    /// Accepts the full filter names and their inline image abbreviations.
    /// `None` for unknown filters.
    pub fn from_name_and_params(name: &[u8], params: Option<&Dictionary>) -> Option<StreamFilter> {
        Some(match full_filter_name(name)? {
            "ASCIIHexDecode" => StreamFilter::ASCIIHexDecode,
            "ASCII85Decode" => StreamFilter::ASCII85Decode,
            "RunLengthDecode" => StreamFilter::RunLengthDecode,
            "LZWDecode" => StreamFilter::LZWDecode (LZWFlateParams::from_dict(params)),
            "FlateDecode" => StreamFilter::FlateDecode (LZWFlateParams::from_dict(params)),
            "JPXDecode" => StreamFilter::JPXDecode,
            "JBIG2Decode" => StreamFilter::JBIG2Decode,
            "DCTDecode" => StreamFilter::DCTDecode (DCTDecodeParams {
                color_transform: params.and_then(|p| p.get("ColorTransform")).and_then(|p| p.as_integer().ok())
            }),
            "CCITTFaxDecode" => StreamFilter::CCITTFaxDecode (CCITTFaxDecodeParams::from_dict(params)),
            _ => StreamFilter::Crypt,
        })
    }

    pub fn name(&self) -> &'static str {
        match *self {
            StreamFilter::ASCIIHexDecode => "ASCIIHexDecode",
            StreamFilter::ASCII85Decode => "ASCII85Decode",
            StreamFilter::RunLengthDecode => "RunLengthDecode",
            StreamFilter::LZWDecode(_) => "LZWDecode",
            StreamFilter::FlateDecode(_) => "FlateDecode",
            StreamFilter::JPXDecode => "JPXDecode",
            StreamFilter::JBIG2Decode => "JBIG2Decode",
            StreamFilter::DCTDecode(_) => "DCTDecode",
            StreamFilter::CCITTFaxDecode(_) => "CCITTFaxDecode",
            StreamFilter::Crypt => "Crypt",
        }
    }

    /// Image filters end a pipeline; their output is pixels, not bytes for the next filter.
    pub fn is_image(&self) -> bool {
        matches!(self,
            StreamFilter::DCTDecode(_) | StreamFilter::CCITTFaxDecode(_) |
            StreamFilter::JPXDecode | StreamFilter::JBIG2Decode
        )
    }
}

/// The full name of a filter given by its full or abbreviated name.
pub fn full_filter_name(name: &[u8]) -> Option<&'static str> {
    Some(match name {
        b"ASCIIHexDecode" | b"AHx" => "ASCIIHexDecode",
        b"ASCII85Decode" | b"A85" => "ASCII85Decode",
        b"RunLengthDecode" | b"RL" => "RunLengthDecode",
        b"LZWDecode" | b"LZW" => "LZWDecode",
        b"FlateDecode" | b"Fl" => "FlateDecode",
        b"DCTDecode" | b"DCT" => "DCTDecode",
        b"CCITTFaxDecode" | b"CCF" => "CCITTFaxDecode",
        b"JPXDecode" => "JPXDecode",
        b"JBIG2Decode" => "JBIG2Decode",
        b"Crypt" => "Crypt",
        _ => return None
    })
}

/// A `/Filter` array is usable if it consists of names only and
/// everything but the last entry is a non-image filter.
pub fn validate_decoder_pipeline(filters: &[Primitive]) -> bool {
    if !filters.iter().all(|f| matches!(f, Primitive::Name(_))) {
        return false;
    }
    let n = filters.len();
    if n <= 1 {
        return true;
    }
    filters[.. n - 1].iter().all(|f| match f {
        Primitive::Name(name) => matches!(full_filter_name(name), Some(
            "FlateDecode" | "LZWDecode" | "ASCII85Decode" | "ASCIIHexDecode" | "RunLengthDecode"
        )),
        _ => false
    })
}

/// The filters of a stream dictionary paired with their `/DecodeParms`.
///
/// An empty list if there is no `/Filter`, `None` if the entry is malformed.
/// Only direct values are considered.
pub fn decoder_array(info: &Dictionary) -> Option<Vec<(Name, Option<Dictionary>)>> {
    let filter = match info.get("Filter") {
        Some(f) => f,
        None => return Some(vec![])
    };
    let params = info.get("DecodeParms");
    match filter {
        Primitive::Name(name) => {
            let params = params.and_then(|p| p.as_dictionary().ok()).cloned();
            Some(vec![(name.clone(), params)])
        }
        Primitive::Array(filters) => {
            if !validate_decoder_pipeline(filters) {
                debug!("invalid filter pipeline {}", filter);
                return None;
            }
            let params = params.and_then(|p| p.as_array().ok());
            Some(filters.iter().enumerate().filter_map(|(i, f)| {
                let name = f.as_name().ok()?.clone();
                let params = params
                    .and_then(|a| a.get(i))
                    .and_then(|p| p.as_dictionary().ok())
                    .cloned();
                Some((name, params))
            }).collect())
        }
        _ => None
    }
}

/// The output of [`decode_pipeline`].
#[derive(Debug)]
pub struct DecodedStream {
    pub data: Vec<u8>,
    /// The image filter the pipeline stopped at, still to be applied to `data`.
    pub image_filter: Option<(Name, Option<Dictionary>)>,
}

/// Runs `data` through `filters` in order. `Crypt` is skipped.
/// Decoding stops before the first image filter (or unknown filter), which is reported.
pub fn decode_pipeline(data: &[u8], filters: &[(Name, Option<Dictionary>)], limit: usize) -> Result<DecodedStream> {
    let mut current = Cow::Borrowed(data);
    for (name, params) in filters {
        match StreamFilter::from_name_and_params(name, params.as_ref()) {
            Some(StreamFilter::Crypt) => continue,
            Some(filter) if !filter.is_image() => {
                let (decoded, _) = match decode(&current, &filter, limit) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        warn!("{} failed: {}", filter.name(), e);
                        #[cfg(feature = "dump")]
                        let _ = crate::error::dump_data(&current);
                        return Err(e);
                    }
                };
                current = Cow::Owned(decoded);
            }
            _ => return Ok(DecodedStream {
                data: current.into_owned(),
                image_filter: Some((name.clone(), params.clone()))
            })
        }
    }
    Ok(DecodedStream { data: current.into_owned(), image_filter: None })
}

/// Decode with a single filter. Returns the output and the number of input bytes consumed.
pub fn decode(data: &[u8], filter: &StreamFilter, limit: usize) -> Result<(Vec<u8>, usize)> {
    let (out, consumed) = match *filter {
        StreamFilter::ASCIIHexDecode => decode_hex(data),
        StreamFilter::ASCII85Decode => decode_85(data),
        StreamFilter::RunLengthDecode => decode_run_length(data),
        StreamFilter::LZWDecode(ref params) => lzw_decode(data, params, limit)?,
        StreamFilter::FlateDecode(ref params) => flate_decode(data, params, limit)?,
        StreamFilter::DCTDecode(_) => dct_decode(data)?,
        StreamFilter::CCITTFaxDecode(ref params) => ccitt_decode(data, params, 0, 0)?,
        StreamFilter::Crypt => (data.to_vec(), data.len()),
        ref f => err!(PdfError::UnknownFilter { name: f.name().into() }),
    };
    if out.len() > limit {
        err!(PdfError::DecodeLimit { limit });
    }
    Ok((out, consumed))
}

pub fn encode(data: &[u8], filter: &StreamFilter) -> Result<Vec<u8>> {
    match *filter {
        StreamFilter::ASCIIHexDecode => {
            let mut out = encode_hex(data);
            out.push(b'>');
            Ok(out)
        }
        StreamFilter::ASCII85Decode => Ok(encode_85(data)),
        StreamFilter::FlateDecode(ref params) if params.predictor <= 1 => Ok(flate_encode(data)),
        ref f => bail!("encoding {} is not supported", f.name()),
    }
}

/// Number of encoded bytes an inline image occupies, given its single filter.
///
/// `width` and `height` are the image dimensions, used where the filter
/// parameters leave them open. `None` if the filter is unknown or fails.
pub fn inline_data_len(data: &[u8], filter: &[u8], params: Option<&Dictionary>, width: u32, height: u32, limit: usize) -> Option<usize> {
    let filter = StreamFilter::from_name_and_params(filter, params)?;
    let consumed = match filter {
        StreamFilter::ASCIIHexDecode => decode_hex(data).1,
        StreamFilter::ASCII85Decode => decode_85(data).1,
        StreamFilter::RunLengthDecode => decode_run_length(data).1,
        StreamFilter::LZWDecode(ref params) => lzw_decode(data, params, limit).ok()?.1,
        StreamFilter::FlateDecode(ref params) => flate_decode(data, params, limit).ok()?.1,
        StreamFilter::DCTDecode(_) => dct_extent(data),
        StreamFilter::CCITTFaxDecode(ref params) => {
            // the fax reader keeps up to two bytes of lookahead; the caller
            // scans for `EI` anyway, so erring short is harmless
            ccitt_decode(data, params, width, height).ok()?.1.saturating_sub(2)
        }
        _ => return None,
    };
    Some(consumed)
}

#[inline]
fn decode_nibble(c: u8) -> Option<u8> {
    match c {
        n @ b'0' ..= b'9' => Some(n - b'0'),
        a @ b'a' ..= b'f' => Some(a - b'a' + 0xa),
        a @ b'A' ..= b'F' => Some(a - b'A' + 0xA),
        _ => None
    }
}

#[inline]
fn encode_nibble(c: u8) -> u8 {
    match c {
        0 ..= 9 => b'0' + c,
        _ => b'A' + c - 10,
    }
}

/// Decodes up to and including the `>` end marker.
/// Characters other than hex digits are skipped; an odd last digit is padded with 0.
pub fn decode_hex(data: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high = None;
    let mut pos = 0;
    while pos < data.len() {
        let c = data[pos];
        pos += 1;
        if c == b'>' {
            break;
        }
        let n = match decode_nibble(c) {
            Some(n) => n,
            None => continue
        };
        match high.take() {
            None => high = Some(n),
            Some(h) => out.push(h << 4 | n),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    (out, pos)
}

pub fn encode_hex(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() * 2);
    for &b in data {
        buf.push(encode_nibble(b >> 4));
        buf.push(encode_nibble(b & 0xf));
    }
    buf
}

#[inline]
fn is_85_space(b: u8) -> bool {
    matches!(b, b' ' | b'\n' | b'\r' | b'\t')
}

/// Decodes up to the `~>` end marker, or the first character outside the alphabet.
///
/// The offending character is consumed, and so is a `>` right after it.
pub fn decode_85(data: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity((data.len() + 4) / 5 * 4);
    let mut state = 0;
    let mut word: u32 = 0;
    let mut pos = 0;
    while pos < data.len() {
        let b = data[pos];
        pos += 1;
        if is_85_space(b) {
            continue;
        }
        if b == b'z' {
            out.extend_from_slice(&[0; 4]);
            state = 0;
            word = 0;
            continue;
        }
        if !(b'!' ..= b'u').contains(&b) {
            break;
        }
        word = word.wrapping_mul(85).wrapping_add((b - b'!') as u32);
        state += 1;
        if state == 5 {
            out.extend_from_slice(&word.to_be_bytes());
            state = 0;
            word = 0;
        }
    }
    if state > 0 {
        // pad the partial group with the highest digit
        for _ in state .. 5 {
            word = word.wrapping_mul(85).wrapping_add(84);
        }
        out.extend_from_slice(&word.to_be_bytes()[.. state - 1]);
    }
    if data.get(pos) == Some(&b'>') {
        pos += 1;
    }
    (out, pos)
}

#[inline]
fn divmod(n: u32, m: u32) -> (u32, u32) {
    (n / m, n % m)
}

#[inline]
fn a85(n: u32) -> u8 {
    n as u8 + 0x21
}

#[inline]
fn base85_chunk(c: [u8; 4]) -> [u8; 5] {
    let n = u32::from_be_bytes(c);
    let (n, e) = divmod(n, 85);
    let (n, d) = divmod(n, 85);
    let (n, c) = divmod(n, 85);
    let (a, b) = divmod(n, 85);

    [a85(a), a85(b), a85(c), a85(d), a85(e)]
}

pub fn encode_85(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity((data.len() / 4) * 5 + 10);
    let mut chunks = data.chunks_exact(4);
    for chunk in chunks.by_ref() {
        let c = [chunk[0], chunk[1], chunk[2], chunk[3]];
        if c == [0; 4] {
            buf.push(b'z');
        } else {
            buf.extend_from_slice(&base85_chunk(c));
        }
    }

    let r = chunks.remainder();
    if !r.is_empty() {
        let mut c = [0; 4];
        c[.. r.len()].copy_from_slice(r);
        let out = base85_chunk(c);
        buf.extend_from_slice(&out[.. r.len() + 1]);
    }
    buf.extend_from_slice(b"~>");
    buf
}

/// Decodes up to and including the end-of-data byte 128.
/// A literal run cut short by the end of the input is filled with zeros.
pub fn decode_run_length(data: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let n = data[i];
        if n == 128 {
            break;
        }
        if n < 128 {
            let len = n as usize + 1;
            let available = &data[i + 1 ..];
            let copied = len.min(available.len());
            out.extend_from_slice(&available[.. copied]);
            out.resize(out.len() + len - copied, 0);
            i += len + 1;
        } else {
            let fill = data.get(i + 1).copied().unwrap_or(0);
            out.resize(out.len() + 257 - n as usize, fill);
            i += 2;
        }
    }
    (out, (i + 1).min(data.len()))
}

fn read_limited(reader: impl Read, out: &mut Vec<u8>, limit: usize) -> Result<()> {
    if let Err(e) = reader.take(limit as u64 + 1).read_to_end(out) {
        // keep what was decoded before the damage
        warn!("flate stream is damaged after {} bytes: {}", out.len(), e);
    }
    if out.len() > limit {
        err!(PdfError::DecodeLimit { limit });
    }
    Ok(())
}

fn inflate(data: &[u8], limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut input = data;
    let zlib = libflate::zlib::Decoder::new(&mut input)
        .map(|decoder| read_limited(decoder, &mut out, limit));
    match zlib {
        Ok(status) => status?,
        Err(_) => {
            info!("invalid zlib header. trying without");
            input = data;
            out.clear();
            read_limited(libflate::deflate::Decoder::new(&mut input), &mut out, limit)?;
        }
    }
    Ok((out, data.len() - input.len()))
}

fn flate_decode(data: &[u8], params: &LZWFlateParams, limit: usize) -> Result<(Vec<u8>, usize)> {
    let (decoded, consumed) = inflate(data, limit)?;
    Ok((apply_predictor(decoded, params, limit)?, consumed))
}

fn flate_encode(data: &[u8]) -> Vec<u8> {
    deflate_bytes_zlib(data)
}

fn lzw_decode(data: &[u8], params: &LZWFlateParams, limit: usize) -> Result<(Vec<u8>, usize)> {
    use weezl::{BitOrder, LzwStatus, decode::Decoder};

    let mut decoder = if params.early_change != 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut out = vec![];
    let mut buf = [0; 4096];
    let mut consumed = 0;
    loop {
        // one byte at a time, so nothing behind the end code is consumed
        let input = &data[consumed .. (consumed + 1).min(data.len())];
        let result = decoder.decode_bytes(input, &mut buf);
        consumed += result.consumed_in;
        out.extend_from_slice(&buf[.. result.consumed_out]);
        if out.len() > limit {
            err!(PdfError::DecodeLimit { limit });
        }
        match result.status {
            Ok(LzwStatus::Ok) => {}
            Ok(LzwStatus::Done) | Ok(LzwStatus::NoProgress) => break,
            Err(e) => {
                warn!("LZW stream is damaged at byte {}: {}", consumed, e);
                break;
            }
        }
    }
    Ok((apply_predictor(out, params, limit)?, consumed))
}

fn dct_decode(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let mut input = data;
    let pixels = jpeg_decoder::Decoder::new(&mut input).decode();
    let consumed = data.len() - input.len();
    match pixels {
        Ok(pixels) => Ok((pixels, consumed)),
        Err(e) => bail!("DCT decoding failed: {}", e),
    }
}

/// Where the JPEG data ends: after the end-of-image marker, or where decoding failed.
fn dct_extent(data: &[u8]) -> usize {
    let mut input = data;
    if let Err(e) = jpeg_decoder::Decoder::new(&mut input).decode() {
        debug!("DCT data is damaged: {}", e);
    }
    data.len() - input.len()
}

/// Decodes to one bit per pixel, rows padded to whole bytes.
/// `width` and `height` are used if the parameters do not give the size.
fn ccitt_decode(data: &[u8], params: &CCITTFaxDecodeParams, width: u32, height: u32) -> Result<(Vec<u8>, usize)> {
    use fax::{decoder, Color};

    let columns = if params.columns > 0 { params.columns } else { width };
    let rows = if params.rows > 0 { params.rows } else { height };
    let width: u16 = match columns.try_into() {
        Ok(w) if w > 0 => w,
        _ => bail!("unsupported CCITT image width {}", columns),
    };
    let row_len = (width as usize + 7) / 8;

    let consumed = Cell::new(0);
    let input = data.iter().copied().inspect(|_| consumed.set(consumed.get() + 1));
    let mut out = Vec::new();
    let black_is_1 = params.black_is_1;
    let line = |transitions: &[u16]| {
        let start = out.len();
        out.resize(start + row_len, 0);
        for (i, color) in decoder::pels(transitions, width).enumerate() {
            let black = matches!(color, Color::Black);
            if black == black_is_1 {
                out[start + i / 8] |= 0x80 >> (i % 8);
            }
        }
    };
    let done = if params.k < 0 {
        decoder::decode_g4(input, width, rows.try_into().ok().filter(|&h: &u16| h > 0), line)
    } else {
        decoder::decode_g3(input, line)
    };
    if done.is_none() {
        debug!("CCITT data ended early after {} bytes", consumed.get());
    }
    Ok((out, consumed.get()))
}

/// Fails if the parameters describe rows that are unusable or longer than `limit`.
fn apply_predictor(data: Vec<u8>, params: &LZWFlateParams, limit: usize) -> Result<Vec<u8>> {
    if params.predictor <= 1 {
        return Ok(data);
    }
    let (bpp, row_len) = match params.geometry(limit) {
        Some(g) => g,
        None => bail!("invalid predictor parameters {:?}", params),
    };
    if params.predictor >= 10 {
        Ok(png_unpredict(&data, bpp, row_len))
    } else if params.predictor == 2 {
        let mut data = data;
        tiff_unpredict(&mut data, params, row_len);
        Ok(data)
    } else {
        debug!("unknown predictor {}", params.predictor);
        Ok(data)
    }
}

/// Each row carries its own predictor tag. A short last row is decoded as far as it goes.
fn png_unpredict(inp: &[u8], bpp: usize, row_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(inp.len());
    // no row is longer than the input
    let width = row_len.min(inp.len());
    let mut prev = vec![0; width];
    let mut row = vec![0; width];
    let mut padded = vec![0; width];

    for chunk in inp.chunks(row_len + 1) {
        let predictor = PredictorType::from_u8(chunk[0]).unwrap_or_else(|e| {
            debug!("{}", e);
            PredictorType::NoFilter
        });
        let data = &chunk[1 ..];
        let row_in = if data.len() < width {
            padded[.. data.len()].copy_from_slice(data);
            padded[data.len() ..].iter_mut().for_each(|b| *b = 0);
            &padded[..]
        } else {
            data
        };
        unfilter(predictor, bpp, &prev, row_in, &mut row);
        out.extend_from_slice(&row[.. data.len()]);
        std::mem::swap(&mut prev, &mut row);
    }
    out
}

/// TIFF predictor 2: every sample is stored as difference to the one before it.
fn tiff_unpredict(data: &mut [u8], params: &LZWFlateParams, row_len: usize) {
    let colors = params.n_components as usize;
    let columns = params.columns as usize;
    for row in data.chunks_mut(row_len) {
        match params.bits_per_component {
            1 => {
                let row_bits = (colors * columns).min(row.len() * 8);
                for i in 1 .. row_bits {
                    let prev = row[(i - 1) / 8] >> (7 - (i - 1) % 8) & 1;
                    let mask = 0x80 >> (i % 8);
                    if prev == 1 {
                        row[i / 8] ^= mask;
                    }
                }
            }
            8 => {
                for i in colors .. row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }
            16 => {
                let step = colors * 2;
                let mut i = step;
                while i + 1 < row.len() {
                    let prev = u16::from_be_bytes([row[i - step], row[i - step + 1]]);
                    let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                    row[i .. i + 2].copy_from_slice(&cur.wrapping_add(prev).to_be_bytes());
                    i += 2;
                }
            }
            bpc => {
                debug!("TIFF predictor with {} bits per component is not supported", bpc);
                return;
            }
        }
    }
}

/*
 * Predictor - copied and adapted from PNG crate..
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PredictorType {
    NoFilter = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4
}

impl PredictorType {
    pub fn from_u8(n: u8) -> Result<PredictorType> {
        match n {
            0 => Ok(PredictorType::NoFilter),
            1 => Ok(PredictorType::Sub),
            2 => Ok(PredictorType::Up),
            3 => Ok(PredictorType::Avg),
            4 => Ok(PredictorType::Paeth),
            n => Err(PdfError::IncorrectPredictorType {n})
        }
    }
}

fn filter_paeth(a: u8, b: u8, c: u8) -> u8 {
    let ia = a as i16;
    let ib = b as i16;
    let ic = c as i16;

    let p = ia + ib - ic;

    let pa = (p - ia).abs();
    let pb = (p - ib).abs();
    let pc = (p - ic).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// `inp`, `prev` and `out` have the same length.
pub fn unfilter(filter: PredictorType, bpp: usize, prev: &[u8], inp: &[u8], out: &mut [u8]) {
    use self::PredictorType::*;
    let len = inp.len();
    debug_assert_eq!(len, out.len());
    debug_assert_eq!(len, prev.len());
    let bpp = bpp.min(len);

    match filter {
        NoFilter => {
            out.copy_from_slice(inp);
        }
        Sub => {
            out[.. bpp].copy_from_slice(&inp[.. bpp]);
            for i in bpp..len {
                out[i] = inp[i].wrapping_add(out[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                out[i] = inp[i].wrapping_add(prev[i]);
            }
        }
        Avg => {
            for i in 0..bpp {
                out[i] = inp[i].wrapping_add(prev[i] / 2);
            }

            for i in bpp..len {
                out[i] = inp[i].wrapping_add(
                    ((out[i - bpp] as i16 + prev[i] as i16) / 2) as u8
                );
            }
        }
        Paeth => {
            for i in 0..bpp {
                out[i] = inp[i].wrapping_add(
                    filter_paeth(0, prev[i], 0)
                );
            }

            for i in bpp..len {
                out[i] = inp[i].wrapping_add(
                    filter_paeth(out[i - bpp], prev[i], prev[i - bpp])
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::PdfStream;

    const LIMIT: usize = 1 << 20;

    #[test]
    fn base_85() {
        fn s(b: &[u8]) -> &str { std::str::from_utf8(b).unwrap() }

        let case = &b"hello world!"[..];
        let encoded = encode_85(case);
        assert_eq!(s(&encoded), "BOu!rD]j7BEbo80~>");
        assert_eq!(decode_85(&encoded), (case.to_vec(), encoded.len()));

        assert_eq!(decode_85(b"FCfN8~>"), (b"test".to_vec(), 7));
        assert_eq!(decode_85(b"\t F C\r\n \tf N 8 ~>"), (b"test".to_vec(), 17));
        assert_eq!(decode_85(b"12A"), (b"2k".to_vec(), 3));
        // 'v' is outside the alphabet and ends the data
        assert_eq!(decode_85(b"FCfN8FCfN8vw"), (b"testtest".to_vec(), 11));
        assert_eq!(decode_85(b"zz~>"), (vec![0; 8], 4));
        assert_eq!(decode_85(b""), (vec![], 0));
    }

    #[test]
    fn hex() {
        assert_eq!(decode_hex(b">"), (vec![], 1));
        assert_eq!(decode_hex(b"12Ac>zzz"), (vec![0x12, 0xac], 5));
        assert_eq!(decode_hex(b"12A>zzz"), (vec![0x12, 0xa0], 4));
        assert_eq!(decode_hex(b"12tk  \tAc>zzz"), (vec![0x12, 0xac], 10));
        assert_eq!(decode_hex(b"12AcED3c3456"), (vec![0x12, 0xac, 0xed, 0x3c, 0x34, 0x56], 12));
        assert_eq!(encode_hex(&[0x0f, 0xa9]), b"0FA9");
    }

    #[test]
    fn run_length() {
        let data = [2, b'a', b'b', b'c', 254, b'x', 128, b'!', b'!'];
        assert_eq!(decode_run_length(&data), (b"abcxxx".to_vec(), 7));

        // literal run longer than the input
        assert_eq!(decode_run_length(&[3, b'a']), (vec![b'a', 0, 0, 0], 2));
        assert_eq!(decode_run_length(&[]), (vec![], 0));
    }

    #[test]
    fn flate() {
        let text = b"The quick brown fox jumps over the lazy dog. The quick brown fox.";
        let encoded = flate_encode(text);
        let (decoded, consumed) = decode(&encoded, &StreamFilter::FlateDecode(Default::default()), LIMIT).unwrap();
        assert_eq!(decoded, &text[..]);
        assert!(consumed <= encoded.len());

        let err = decode(&encoded, &StreamFilter::FlateDecode(Default::default()), 10).unwrap_err();
        assert!(matches!(err, PdfError::DecodeLimit { limit: 10 }));
    }

    #[test]
    fn lzw() {
        use weezl::{BitOrder, encode::Encoder};
        let text = b"-----A---B-----A---B-----A---B";
        let encoded = Encoder::with_tiff_size_switch(BitOrder::Msb, 8).encode(text).unwrap();
        let mut data = encoded.clone();
        data.extend_from_slice(b" EI");

        let (decoded, consumed) = decode(&data, &StreamFilter::LZWDecode(Default::default()), LIMIT).unwrap();
        assert_eq!(decoded, &text[..]);
        assert!(consumed <= encoded.len());
    }

    #[test]
    fn png_predictor() {
        // two rows of three bytes: Sub and Up
        let params = LZWFlateParams { predictor: 12, columns: 3, ..Default::default() };
        let data = vec![1, 1, 1, 1, 2, 1, 2, 3];
        assert_eq!(apply_predictor(data, &params, LIMIT).unwrap(), [1, 2, 3, 2, 4, 6]);

        // short last row
        let data = vec![0, 5, 6, 7, 2, 1];
        assert_eq!(apply_predictor(data, &params, LIMIT).unwrap(), [5, 6, 7, 6]);
    }

    #[test]
    fn predictor_rows_are_bounded() {
        let params = LZWFlateParams { predictor: 12, columns: 1_000_000_000, ..Default::default() };
        assert!(apply_predictor(vec![2, 1, 2, 3], &params, LIMIT).is_err());

        // the row fits the budget but not the data: only the data is decoded
        let params = LZWFlateParams { predictor: 12, columns: 1 << 20, ..Default::default() };
        assert_eq!(apply_predictor(vec![1, 1, 2, 3], &params, LIMIT).unwrap(), [1, 3, 6]);

        let params = LZWFlateParams { predictor: 2, n_components: 3, columns: i32::MAX, ..Default::default() };
        assert!(apply_predictor(vec![1, 2, 3], &params, LIMIT).is_err());

        // through a stream with a huge /Columns
        let mut parms = Dictionary::new();
        parms.insert("Predictor", 12);
        parms.insert("Columns", 1_000_000_000);
        let mut info = Dictionary::new();
        info.insert("Filter", Primitive::name("FlateDecode"));
        info.insert("DecodeParms", parms);
        let stream = PdfStream::new(info, flate_encode(&[2, 1, 2, 3]));
        assert!(stream.decoded().is_err());
    }

    #[test]
    fn tiff_predictor() {
        let params = LZWFlateParams { predictor: 2, columns: 4, ..Default::default() };
        assert_eq!(apply_predictor(vec![1, 1, 1, 1, 5, 0, 1, 2], &params, LIMIT).unwrap(), [1, 2, 3, 4, 5, 5, 6, 8]);
    }

    #[test]
    fn pipeline_validation() {
        let names = |names: &[&str]| names.iter().map(|&n| Primitive::name(n)).collect::<Vec<_>>();
        assert!(validate_decoder_pipeline(&[]));
        assert!(validate_decoder_pipeline(&names(&["DCTDecode"])));
        assert!(validate_decoder_pipeline(&names(&["A85", "FlateDecode", "DCT"])));
        assert!(!validate_decoder_pipeline(&names(&["DCTDecode", "FlateDecode"])));
        assert!(!validate_decoder_pipeline(&names(&["CCF", "DCTDecode"])));
        assert!(!validate_decoder_pipeline(&[Primitive::Integer(1)]));
    }

    #[test]
    fn decoder_arrays() {
        let mut info = Dictionary::new();
        assert_eq!(decoder_array(&info), Some(vec![]));

        let mut params = Dictionary::new();
        params.insert("Predictor", 12);
        info.insert("Filter", Primitive::from(vec![Primitive::name("AHx"), Primitive::name("Fl")]));
        info.insert("DecodeParms", Primitive::from(vec![Primitive::Null, params.clone().into()]));
        let filters = decoder_array(&info).unwrap();
        assert_eq!(filters, [(Name::from("AHx"), None), (Name::from("Fl"), Some(params))]);

        info.insert("Filter", 5);
        assert_eq!(decoder_array(&info), None);
    }

    #[test]
    fn pipeline_stops_at_images() {
        let filters = [
            (Name::from("ASCIIHexDecode"), None),
            (Name::from("Crypt"), None),
            (Name::from("DCTDecode"), None),
        ];
        let result = decode_pipeline(b"ffd8>", &filters, LIMIT).unwrap();
        assert_eq!(result.data, [0xff, 0xd8]);
        assert_eq!(result.image_filter.map(|(name, _)| name), Some(Name::from("DCTDecode")));
    }

    #[test]
    fn inline_lengths() {
        assert_eq!(inline_data_len(b"414243> EI", b"AHx", None, 3, 1, LIMIT), Some(7));
        assert_eq!(inline_data_len(b"5sdp~> EI", b"A85", None, 3, 1, LIMIT), Some(6));
        assert_eq!(inline_data_len(b"abc", b"JBIG2Decode", None, 3, 1, LIMIT), None);
        assert_eq!(inline_data_len(b"abc", b"Unknown", None, 3, 1, LIMIT), None);
    }

    #[test]
    fn encoding() {
        let hex = encode(b"AB", &StreamFilter::ASCIIHexDecode).unwrap();
        assert_eq!(hex, b"4142>");
        assert!(encode(b"AB", &StreamFilter::JPXDecode).is_err());
    }
}
