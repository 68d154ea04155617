// SPDX-License-Identifier: MIT

use criterion::{Criterion, criterion_group, criterion_main};

use slofs::slofs::*;

criterion_group!(benches, slofs_format_bench, slofs_io_bench);
criterion_main!(benches);

const SIZE_MB: u64 = 32;
const SIZE_BYTES: u64 = SIZE_MB * 1024 * 1024;

fn force() -> SloFormatOptions {
    SloFormatOptions {
        force: true,
        ..SloFormatOptions::default()
    }
}

pub fn slofs_format_bench(c: &mut Criterion) {
    let meta = SloMeta::new(SIZE_BYTES, Some("BENCHFS"));

    let mut buf = vec![0u8; SIZE_BYTES as usize];
    let mut mem_io = MemBlockIO::new(&mut buf);

    c.bench_function("slofs_format_mem", |b| {
        b.iter(|| {
            mkfs(&mut mem_io, &meta, &force()).expect("format failed");
        });
    });

    let mut file = tempfile::tempfile().expect("tempfile failed");
    file.set_len(SIZE_BYTES).expect("set_len failed");
    let mut temp_io = StdBlockIO::new(&mut file);

    c.bench_function("slofs_format_file", |b| {
        b.iter(|| {
            mkfs(&mut temp_io, &meta, &force()).expect("format failed");
        });
    });
}

pub fn slofs_io_bench(c: &mut Criterion) {
    let meta = SloMeta::new(SIZE_BYTES, Some("BENCHFS"));
    let chunk = vec![0xA5u8; 64 * 1024];

    let mut buf = vec![0u8; SIZE_BYTES as usize];
    let mut mem_io = MemBlockIO::new(&mut buf);

    c.bench_function("slofs_sequential_write_mem", |b| {
        b.iter(|| {
            mkfs(&mut mem_io, &meta, &force()).expect("format failed");
            let mut vol = SloVolume::mount(&mut mem_io).expect("mount failed");
            let fh = vol.open("/stream", "w").expect("open failed");
            for _ in 0..64 {
                vol.write(fh, &chunk).expect("write failed");
            }
            vol.unmount().expect("unmount failed");
        });
    });

    c.bench_function("slofs_directory_fill_mem", |b| {
        b.iter(|| {
            mkfs(&mut mem_io, &meta, &force()).expect("format failed");
            let mut vol = SloVolume::mount(&mut mem_io).expect("mount failed");
            vol.mkdir("/many").expect("mkdir failed");
            for i in 0..256 {
                let fh = vol.open(&format!("/many/f{i:03}"), "w").expect("open failed");
                vol.write(fh, b"payload").expect("write failed");
                vol.close(fh).expect("close failed");
            }
            vol.unmount().expect("unmount failed");
        });
    });

    mkfs(&mut mem_io, &meta, &force()).expect("format failed");
    {
        let mut vol = SloVolume::mount(&mut mem_io).expect("mount failed");
        let fh = vol.open("/stream", "w").expect("open failed");
        for _ in 0..64 {
            vol.write(fh, &chunk).expect("write failed");
        }
        vol.unmount().expect("unmount failed");
    }

    c.bench_function("slofs_sequential_read_mem", |b| {
        let mut out = vec![0u8; chunk.len()];
        b.iter(|| {
            let mut vol = SloVolume::mount(&mut mem_io).expect("mount failed");
            let fh = vol.open("/stream", "r").expect("open failed");
            while vol.read(fh, &mut out).expect("read failed") > 0 {}
            vol.unmount().expect("unmount failed");
        });
    });

    c.bench_function("slofs_check_mem", |b| {
        b.iter(|| {
            let mut checker = SloChecker::new(&mut mem_io);
            checker
                .check_with(&SloCheckOptions::default())
                .expect("check failed");
        });
    });
}
