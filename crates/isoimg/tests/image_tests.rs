mod common;

use common::*;
use isoimg::ImageWriter;

fn emit(writer: &mut ImageWriter) -> Vec<u8> {
  let mut out = Vec::new();
  writer.write_to(&mut out).unwrap();
  assert_eq!(out.len() % SECTOR, 0, "image is not sector aligned");
  out
}

#[test]
fn empty_image_is_eighteen_sectors() {
  let mut writer = ImageWriter::new();
  let out = emit(&mut writer);

  assert_eq!(out.len(), 18 * SECTOR);
  assert!(out[..16 * SECTOR].iter().all(|&b| b == 0), "system area is not zeroed");

  let pvd = sector(&out, 16);
  assert_eq!(pvd[0], 1);
  assert_eq!(&pvd[1..6], b"CD001");
  assert_eq!(pvd[6], 1);
  assert_eq!(both_u32(&pvd[80..88]), 18); // volume space size

  // the root directory record declares a zero-length extent
  assert_eq!(pvd[156], 34);
  assert_eq!(both_u32(&pvd[166..174]), 0);

  let terminator = sector(&out, 17);
  assert_eq!(terminator[0], 255);
  assert_eq!(&terminator[1..6], b"CD001");
}

#[test]
fn single_file_occupies_the_expected_extents() {
  let mut writer = ImageWriter::new();
  writer.add_file(b"Hi\n".as_slice(), "hello.txt").unwrap();
  let out = emit(&mut writer);

  assert_eq!(out.len(), 20 * SECTOR);

  let pvd = sector(&out, 16);
  assert_eq!(both_u32(&pvd[80..88]), 20);
  assert_eq!(both_u32(&pvd[158..166]), 18); // root extent location
  assert_eq!(both_u32(&pvd[166..174]), 2048); // root extent length

  let records = parse_records(sector(&out, 18));
  assert_eq!(records.len(), 3);
  assert_eq!(records[0].identifier, [0x00]);
  assert_eq!(records[1].identifier, [0x01]);
  assert_eq!(records[2].identifier, b"HELLO.TXT;1");
  assert_eq!(records[2].location, 19);
  assert_eq!(records[2].length, 3);
  assert_eq!(records[2].flags, 0);

  let payload = sector(&out, 19);
  assert_eq!(&payload[..3], b"Hi\n");
  assert!(payload[3..].iter().all(|&b| b == 0), "file extent is not zero padded");
}

#[test]
fn listing_is_sorted_regardless_of_staging_order() {
  let mut writer = ImageWriter::new();
  writer.add_file(b"b".as_slice(), "b.txt").unwrap();
  writer.add_file(b"a".as_slice(), "a.txt").unwrap();
  let out = emit(&mut writer);

  let records = parse_records(sector(&out, 18));
  assert_eq!(records[2].identifier, b"A.TXT;1");
  assert_eq!(records[2].location, 19);
  assert_eq!(records[3].identifier, b"B.TXT;1");
  assert_eq!(records[3].location, 20);
}

#[test]
fn hundred_files_pack_without_straddling_records() {
  let mut writer = ImageWriter::new();
  for i in 0..100 {
    writer.add_file(b"x".as_slice(), &format!("file_{i:03}.txt")).unwrap();
  }
  let out = emit(&mut writer);

  let pvd = sector(&out, 16);
  let root_length = both_u32(&pvd[166..174]) as usize;
  let dir_sectors = root_length / SECTOR;
  assert_eq!(out.len(), (18 + dir_sectors + 100) * SECTOR);
  assert_eq!(both_u32(&pvd[80..88]) as usize, 18 + dir_sectors + 100);

  // parse_records asserts the no-straddle rule as it walks
  let extent = &out[18 * SECTOR..18 * SECTOR + root_length];
  let records = parse_records(extent);
  assert_eq!(records.len(), 102);

  // children are strictly ascending, and every file extent follows the
  // previous allocation
  for (i, record) in records[2..].iter().enumerate() {
    assert_eq!(record.identifier, format!("FILE_{i:03}.TXT;1").as_bytes());
    assert_eq!(record.location as usize, 18 + dir_sectors + i);
    assert_eq!(record.length, 1);
  }
}

#[test]
fn nested_directories_are_created_and_listed() {
  let mut writer = ImageWriter::new();
  writer.add_file(b"deep".as_slice(), "a/b/c.txt").unwrap();
  writer.add_file(b"top".as_slice(), "top.txt").unwrap();
  let out = emit(&mut writer);

  let root = parse_records(sector(&out, 18));
  let a = find_record(&root, b"A");
  assert_ne!(a.flags & 0x02, 0, "A is not flagged as a directory");
  let top = find_record(&root, b"TOP.TXT;1");
  assert_eq!(top.flags & 0x02, 0);

  let a_records = parse_records(sector(&out, a.location));
  // self entry points back at the directory, parent at the root
  assert_eq!(a_records[0].location, a.location);
  assert_eq!(a_records[1].location, 18);

  let b = find_record(&a_records, b"B");
  let b_records = parse_records(sector(&out, b.location));
  let c = find_record(&b_records, b"C.TXT;1");
  assert_eq!(&sector(&out, c.location)[..4], b"deep");
}

#[test]
fn stem_dots_collapse_in_identifiers() {
  let mut writer = ImageWriter::new();
  writer.add_file(b"cfg".as_slice(), "foo.bar.ignition").unwrap();
  let out = emit(&mut writer);

  let records = parse_records(sector(&out, 18));
  assert_eq!(records[2].identifier, b"FOO_BAR.IGNITION;1");
}

#[test]
fn staging_conflicts_surface_synchronously() {
  let mut writer = ImageWriter::new();
  writer.add_file(b"1".as_slice(), "data/file.txt").unwrap();

  assert!(matches!(
    writer.add_file(b"2".as_slice(), "data/file.txt"),
    Err(isoimg::Error::AlreadyExists(_))
  ));
  assert!(matches!(
    writer.add_local(std::env::temp_dir(), "tmp.bin"),
    Err(isoimg::Error::IsDir(_))
  ));

  // the writer stays usable after a staging error
  writer.add_file(b"4".as_slice(), "data/other.txt").unwrap();
  emit(&mut writer);
}

#[test]
fn local_files_are_streamed_at_emission() {
  let dir = std::env::temp_dir().join(format!("isoimg-test-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("payload.bin");
  std::fs::write(&path, vec![7u8; 3000]).unwrap();

  let mut writer = ImageWriter::new();
  writer.add_local(&path, "payload.bin").unwrap();
  let out = emit(&mut writer);

  let records = parse_records(sector(&out, 18));
  let record = find_record(&records, b"PAYLOAD.BIN;1");
  assert_eq!(record.length, 3000);
  let start = record.location as usize * SECTOR;
  assert!(out[start..start + 3000].iter().all(|&b| b == 7));
  assert!(out[start + 3000..start + 2 * SECTOR].iter().all(|&b| b == 0));

  std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_local_files_are_reported() {
  let mut writer = ImageWriter::new();
  let err = writer.add_local("/definitely/not/here", "x.bin").unwrap_err();
  assert!(matches!(err, isoimg::Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
}
