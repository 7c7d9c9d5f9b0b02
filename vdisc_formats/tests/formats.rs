//! End-to-end tests: build a small image of every container, hand it to
//! `open_disc` and compare what comes out with the logical data.
use std::io::{Cursor, Write};

use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use vdisc_core::{DiscFormat, DiscReader, Error, Options, SharedStream};
use vdisc_formats::{detect, open_disc, open_format};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sample(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + seed as usize) % 241) as u8).collect()
}

fn stream(bytes: Vec<u8>) -> SharedStream {
    SharedStream::new(Cursor::new(bytes)).unwrap()
}

fn read_all(reader: &mut dyn DiscReader) -> Vec<u8> {
    let mut out = vec![0u8; reader.size() as usize + 16];
    let n = reader.read(&mut out);
    out.truncate(n);
    out
}

/// GameCube CISO with 32 KiB blocks; `None` entries are absent.
fn ciso_image(blocks: &[Option<Vec<u8>>]) -> Vec<u8> {
    let bs = 0x8000usize;
    let mut out = vec![0u8; 0x8000];
    out[..4].copy_from_slice(b"CISO");
    out[4..8].copy_from_slice(&(bs as u32).to_le_bytes());
    for (i, block) in blocks.iter().enumerate() {
        if let Some(data) = block {
            out[8 + i] = 1;
            out.extend_from_slice(data);
        }
    }
    out
}

/// WBFS with 512-byte hd sectors and 128 KiB blocks, one disc slot.
fn wbfs_image(blocks: &[Option<Vec<u8>>]) -> Vec<u8> {
    let bs = 1usize << 17;
    let mut out = vec![0u8; 2 * bs];
    out[..4].copy_from_slice(b"WBFS");
    out[4..8].copy_from_slice(&64u32.to_be_bytes());
    out[8] = 9;
    out[9] = 17;
    out[12] = 1;
    let table = 512 + 0x100;
    let mut next_lba = 2u16;
    for (i, block) in blocks.iter().enumerate() {
        if let Some(data) = block {
            out[table + i * 2..table + i * 2 + 2].copy_from_slice(&next_lba.to_be_bytes());
            out.extend_from_slice(data);
            next_lba += 1;
        }
    }
    out
}

/// GCZ with every block zlib-compressed.
fn gcz_image(data: &[u8], bs: usize) -> Vec<u8> {
    let mut pointers = Vec::new();
    let mut body = Vec::new();
    for chunk in data.chunks(bs) {
        pointers.push(body.len() as u64);
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(chunk).unwrap();
        body.extend_from_slice(&enc.finish().unwrap());
    }
    let mut out = Vec::new();
    out.extend_from_slice(&0xB10B_C001u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    out.extend_from_slice(&(bs as u32).to_le_bytes());
    out.extend_from_slice(&(pointers.len() as u32).to_le_bytes());
    pointers.iter().for_each(|p| out.extend_from_slice(&p.to_le_bytes()));
    pointers.iter().for_each(|_| out.extend_from_slice(&[0u8; 4]));
    out.extend_from_slice(&body);
    out
}

/// CSO (deflate) or ZSO (lz4) without index alignment.
fn cso_image(magic: &[u8; 4], data: &[u8], bs: usize) -> Vec<u8> {
    let chunks: Vec<&[u8]> = data.chunks(bs).collect();
    let mut out = Vec::new();
    out.extend_from_slice(magic);
    out.extend_from_slice(&0x18u32.to_le_bytes());
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    out.extend_from_slice(&(bs as u32).to_le_bytes());
    out.extend_from_slice(&[1, 0, 0, 0]);

    let index_at = out.len();
    out.resize(index_at + (chunks.len() + 1) * 4, 0);
    let mut index = Vec::new();
    for chunk in &chunks {
        index.push(out.len() as u32);
        if magic == b"ZISO" {
            out.extend_from_slice(&lz4_flex::block::compress(chunk));
        } else {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(chunk).unwrap();
            out.extend_from_slice(&enc.finish().unwrap());
        }
    }
    index.push(out.len() as u32);
    for (i, entry) in index.iter().enumerate() {
        out[index_at + i * 4..index_at + i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
    }
    out
}

#[test]
fn test_open_plain_file() {
    init_logging();
    let data = sample(10_000, 3);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let stream = SharedStream::open(file.path()).unwrap();
    let mut reader = open_disc(stream, &Options::default()).unwrap();
    assert_eq!(reader.size(), data.len() as u64);
    assert_eq!(read_all(reader.as_mut()), data);
}

#[test]
fn test_open_ciso() {
    init_logging();
    let a = sample(0x8000, 1);
    let c = sample(0x8000, 2);
    let image = ciso_image(&[Some(a.clone()), None, Some(c.clone())]);
    assert_eq!(detect(&image[..512], image.len() as u64), Some(DiscFormat::GcnCiso));

    let mut reader = open_disc(stream(image), &Options::default()).unwrap();
    let mut expected = a;
    expected.extend(std::iter::repeat(0u8).take(0x8000));
    expected.extend_from_slice(&c);
    assert_eq!(read_all(reader.as_mut()), expected);
}

#[test]
fn test_open_wbfs() {
    init_logging();
    let bs = 1usize << 17;
    let b1 = sample(bs, 9);
    let image = wbfs_image(&[None, Some(b1.clone())]);
    assert_eq!(detect(&image[..512], image.len() as u64), Some(DiscFormat::Wbfs));

    let mut reader = open_disc(stream(image), &Options::default()).unwrap();
    assert_eq!(reader.size(), 2 * bs as u64);

    let mut buf = vec![0u8; 64];
    assert_eq!(reader.seek_and_read(bs as u64 - 32, &mut buf).unwrap(), 64);
    assert!(buf[..32].iter().all(|&b| b == 0));
    assert_eq!(&buf[32..], &b1[..32]);
}

#[test]
fn test_open_gcz() {
    init_logging();
    let data = sample(5 * 0x4000 + 123, 4);
    let image = gcz_image(&data, 0x4000);
    assert_eq!(detect(&image[..512], image.len() as u64), Some(DiscFormat::Gcz));

    let mut reader = open_disc(stream(image), &Options::default()).unwrap();
    assert_eq!(read_all(reader.as_mut()), data);
}

#[test]
fn test_open_cso_and_zso() {
    init_logging();
    let data = sample(6 * 0x800 + 17, 5);
    for (magic, format) in [(b"CISO", DiscFormat::Cso), (b"ZISO", DiscFormat::Zso)] {
        let image = cso_image(magic, &data, 0x800);
        assert_eq!(detect(&image[..64], image.len() as u64), Some(format));

        let mut reader = open_disc(stream(image), &Options::default()).unwrap();
        assert_eq!(reader.size(), data.len() as u64);
        assert_eq!(read_all(reader.as_mut()), data);
    }
}

#[test]
fn test_open_format_skips_detection() {
    let data = sample(0x800, 6);
    let image = cso_image(b"CISO", &data, 0x800);

    // Forced to plain, the container bytes come back verbatim.
    let mut raw = open_format(stream(image.clone()), DiscFormat::Plain, &Options::default()).unwrap();
    assert_eq!(read_all(raw.as_mut()), image);

    let mut cso = open_format(stream(image), DiscFormat::Cso, &Options::default()).unwrap();
    assert_eq!(read_all(cso.as_mut()), data);
}

#[test]
fn test_empty_file_is_rejected() {
    let err = open_disc(stream(Vec::new()), &Options::default()).err().unwrap();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn test_corrupt_container_is_rejected() {
    // A valid CISO header whose map marks no block present.
    let image = ciso_image(&[None, None]);
    let err = open_disc(stream(image), &Options::default()).err().unwrap();
    assert!(matches!(err, Error::Corrupt(_)));
}

#[test]
fn test_limits_apply_through_open_disc() {
    let image = gcz_image(&sample(0x4000, 7), 0x4000);
    let options = Options::default().max_block_size(0x2000);
    let err = open_disc(stream(image), &options).err().unwrap();
    assert!(matches!(err, Error::Unsupported(_)));

    let bad = Options::default().header_probe_len(4);
    assert!(matches!(open_disc(stream(vec![1, 2, 3]), &bad), Err(Error::InvalidArgument(_))));
}
