//! Shared GIF89a inspection helpers for integration tests: a block-structure
//! walker and a reference LZW decoder.
#![allow(dead_code)]

#[derive(Debug)]
pub struct GifDoc {
    pub width: u16,
    pub height: u16,
    pub gct_entries: usize,
    pub gct: Vec<[u8; 3]>,
    pub bg_index: u8,
    /// Repeat count from the NETSCAPE2.0 extension, when present (0 = loop
    /// forever).
    pub loop_count: Option<u16>,
    pub frames: Vec<FrameBlock>,
}

#[derive(Debug)]
pub struct FrameBlock {
    pub delay_cs: u16,
    pub disposal: u8,
    pub width: u16,
    pub height: u16,
    pub lzw_min_code: u8,
    /// Concatenated image data sub-blocks (still LZW-compressed).
    pub data: Vec<u8>,
}

/// Walk a complete GIF89a byte stream, asserting its block grammar.
pub fn parse_gif(bytes: &[u8]) -> GifDoc {
    assert!(bytes.len() > 13, "document too short");
    assert_eq!(&bytes[..6], b"GIF89a", "header");

    let width = u16::from_le_bytes([bytes[6], bytes[7]]);
    let height = u16::from_le_bytes([bytes[8], bytes[9]]);
    let packed = bytes[10];
    assert_ne!(packed & 0x80, 0, "global color table must be present");
    let gct_entries = 1usize << ((packed & 0x07) + 1);
    let bg_index = bytes[11];

    let mut pos = 13;
    let gct: Vec<[u8; 3]> = (0..gct_entries)
        .map(|i| {
            let o = pos + i * 3;
            [bytes[o], bytes[o + 1], bytes[o + 2]]
        })
        .collect();
    pos += gct_entries * 3;

    let mut loop_count = None;
    let mut frames = Vec::new();
    let mut pending_gce: Option<(u16, u8)> = None;

    loop {
        match bytes[pos] {
            0x3B => {
                assert_eq!(pos, bytes.len() - 1, "trailer must be the last byte");
                break;
            }
            0x21 => {
                let label = bytes[pos + 1];
                pos += 2;
                match label {
                    0xF9 => {
                        assert_eq!(bytes[pos], 4, "GCE block size");
                        let gce_packed = bytes[pos + 1];
                        let delay = u16::from_le_bytes([bytes[pos + 2], bytes[pos + 3]]);
                        let disposal = (gce_packed >> 2) & 0x07;
                        pending_gce = Some((delay, disposal));
                        pos += 5;
                        assert_eq!(bytes[pos], 0, "GCE terminator");
                        pos += 1;
                    }
                    0xFF => {
                        let app_len = bytes[pos] as usize;
                        let app = &bytes[pos + 1..pos + 1 + app_len];
                        pos += 1 + app_len;
                        let data = read_sub_blocks(bytes, &mut pos);
                        if app == b"NETSCAPE2.0" {
                            assert_eq!(data[0], 1, "netscape sub-block id");
                            loop_count = Some(u16::from_le_bytes([data[1], data[2]]));
                        }
                    }
                    _ => {
                        let _ = read_sub_blocks(bytes, &mut pos);
                    }
                }
            }
            0x2C => {
                let left = u16::from_le_bytes([bytes[pos + 1], bytes[pos + 2]]);
                let top = u16::from_le_bytes([bytes[pos + 3], bytes[pos + 4]]);
                let fw = u16::from_le_bytes([bytes[pos + 5], bytes[pos + 6]]);
                let fh = u16::from_le_bytes([bytes[pos + 7], bytes[pos + 8]]);
                let id_packed = bytes[pos + 9];
                assert_eq!(left, 0);
                assert_eq!(top, 0);
                assert_eq!(id_packed & 0x80, 0, "no local color table expected");
                pos += 10;
                let lzw_min_code = bytes[pos];
                pos += 1;
                let data = read_sub_blocks(bytes, &mut pos);
                let (delay_cs, disposal) = pending_gce
                    .take()
                    .expect("every image block must follow a graphic control extension");
                frames.push(FrameBlock {
                    delay_cs,
                    disposal,
                    width: fw,
                    height: fh,
                    lzw_min_code,
                    data,
                });
            }
            other => panic!("unexpected block introducer 0x{other:02X} at {pos}"),
        }
    }

    GifDoc {
        width,
        height,
        gct_entries,
        gct,
        bg_index,
        loop_count,
        frames,
    }
}

fn read_sub_blocks(bytes: &[u8], pos: &mut usize) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let len = bytes[*pos] as usize;
        *pos += 1;
        if len == 0 {
            return out;
        }
        out.extend_from_slice(&bytes[*pos..*pos + len]);
        *pos += len;
    }
}

/// Reference GIF-flavor LZW decoder (LSB-first, variable code width).
pub fn lzw_decode(data: &[u8], min_code_size: u8) -> Vec<u8> {
    let clear = 1u16 << min_code_size;
    let eoi = clear + 1;
    let base_len = usize::from(clear) + 2;
    let mut width = min_code_size + 1;
    let mut table: Vec<Vec<u8>> = (0..clear).map(|i| vec![i as u8]).collect();
    table.push(Vec::new());
    table.push(Vec::new());
    let mut out = Vec::new();
    let mut prev: Option<Vec<u8>> = None;
    let mut bit_pos = 0usize;

    let read_code = |bit_pos: &mut usize, width: u8| -> Option<u16> {
        if *bit_pos + usize::from(width) > data.len() * 8 {
            return None;
        }
        let mut code = 0u16;
        for i in 0..width {
            let bit = (data[*bit_pos / 8] >> (*bit_pos % 8)) & 1;
            code |= u16::from(bit) << i;
            *bit_pos += 1;
        }
        Some(code)
    };

    loop {
        let code = read_code(&mut bit_pos, width).expect("ran out of bits before EOI");
        if code == clear {
            table.truncate(base_len);
            width = min_code_size + 1;
            prev = None;
            continue;
        }
        if code == eoi {
            break;
        }
        let entry: Vec<u8> = if usize::from(code) < table.len() {
            table[usize::from(code)].clone()
        } else {
            let p = prev.as_ref().expect("code beyond table with no prefix");
            assert_eq!(usize::from(code), table.len(), "code skips table");
            let mut e = p.clone();
            e.push(p[0]);
            e
        };
        out.extend_from_slice(&entry);
        if let Some(p) = prev.take() {
            if table.len() < 4096 {
                let mut ne = p;
                ne.push(entry[0]);
                table.push(ne);
            }
        }
        if table.len() == (1usize << width) && width < 12 {
            width += 1;
        }
        prev = Some(entry);
    }
    out
}
