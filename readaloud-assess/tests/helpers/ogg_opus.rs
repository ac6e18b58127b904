//! Ogg Opus fixture builder
//!
//! Builds a mono Ogg Opus stream in memory, the container a browser produces
//! with `MediaRecorder` when Ogg is requested. Audio packets are TOC-only
//! 20 ms CELT frames, which a decoder renders as silence of the full frame
//! duration.

use symphonia::core::checksum::Crc32;
use symphonia::core::io::Monitor;

/// Samples per 20 ms frame at the Opus clock rate
pub const OPUS_FRAME_SAMPLES: u64 = 960;

const PRE_SKIP: u16 = 312;
const SERIAL: u32 = 0x5EAD_A10D;

const FLAG_FIRST_PAGE: u8 = 0x02;
const FLAG_LAST_PAGE: u8 = 0x04;

/// Config 31 (CELT fullband, 20 ms), mono, one frame per packet
const TOC_CELT_FB_20MS: u8 = 31 << 3;

fn ogg_page(flags: u8, granule: u64, sequence: u32, packet: &[u8]) -> Vec<u8> {
    assert!(packet.len() < 255, "fixture packets fit one segment");

    let mut page = Vec::with_capacity(28 + packet.len());
    page.extend_from_slice(b"OggS");
    page.push(0);
    page.push(flags);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&SERIAL.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&[0u8; 4]);
    page.push(1);
    page.push(packet.len() as u8);
    page.extend_from_slice(packet);

    let mut crc = Crc32::new(0);
    crc.process_buf_bytes(&page);
    page[22..26].copy_from_slice(&crc.crc().to_le_bytes());
    page
}

fn opus_head() -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1); // version
    head.push(1); // channels
    head.extend_from_slice(&PRE_SKIP.to_le_bytes());
    head.extend_from_slice(&48_000u32.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes());
    head.push(0); // mapping family
    head
}

fn opus_tags() -> Vec<u8> {
    let vendor = b"readaloud-tests";
    let mut tags = Vec::new();
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    tags.extend_from_slice(vendor);
    tags.extend_from_slice(&0u32.to_le_bytes());
    tags
}

/// Mono Ogg Opus stream of `frames` 20 ms frames
pub fn ogg_opus_bytes(frames: u32) -> Vec<u8> {
    let mut stream = ogg_page(FLAG_FIRST_PAGE, 0, 0, &opus_head());
    stream.extend(ogg_page(0, 0, 1, &opus_tags()));

    for i in 0..frames {
        let flags = if i + 1 == frames { FLAG_LAST_PAGE } else { 0 };
        let granule = OPUS_FRAME_SAMPLES * u64::from(i + 1);
        stream.extend(ogg_page(flags, granule, i + 2, &[TOC_CELT_FB_20MS]));
    }

    stream
}
