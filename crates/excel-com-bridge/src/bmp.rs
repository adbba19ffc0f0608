//! Wrapping a packed device-independent bitmap (`CF_DIB`) into a BMP file.

const FILE_HEADER_LEN: u32 = 14;
const BI_BITFIELDS: u32 = 3;

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Prepend a `BITMAPFILEHEADER` to a packed DIB.
///
/// The pixel data offset accounts for the info header, the optional
/// bit-field masks and the color table.
pub fn dib_to_bmp(dib: &[u8]) -> Result<Vec<u8>, String> {
    let header_len = read_u32(dib, 0).ok_or("bitmap header is truncated")?;
    if header_len < 12 || header_len as usize > dib.len() {
        return Err(format!("invalid bitmap header size {header_len}"));
    }

    let palette_len = if header_len == 12 {
        // BITMAPCOREHEADER: RGBTRIPLE palette, no compression field
        let bit_count = read_u16(dib, 10).ok_or("bitmap header is truncated")?;
        if bit_count <= 8 {
            3 * (1u32 << bit_count)
        } else {
            0
        }
    } else {
        let bit_count = read_u16(dib, 14).ok_or("bitmap header is truncated")?;
        let compression = read_u32(dib, 16).ok_or("bitmap header is truncated")?;
        let colors_used = read_u32(dib, 32).unwrap_or(0);
        let masks = if compression == BI_BITFIELDS && header_len == 40 {
            12
        } else {
            0
        };
        let colors = if colors_used > 0 {
            colors_used
        } else if bit_count <= 8 {
            1u32 << bit_count
        } else {
            0
        };
        masks + 4 * colors
    };

    let pixel_offset = FILE_HEADER_LEN + header_len + palette_len;
    let file_len = FILE_HEADER_LEN as usize + dib.len();
    let file_len = u32::try_from(file_len).map_err(|_| "bitmap is too large".to_string())?;

    let mut out = Vec::with_capacity(file_len as usize);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_len.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&pixel_offset.to_le_bytes());
    out.extend_from_slice(dib);
    Ok(out)
}
