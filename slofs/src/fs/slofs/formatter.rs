// SPDX-License-Identifier: MIT

use sloio::prelude::*;
use tracing::info;

use crate::core::{
    FsFormatterError, FsFormatterResult, FsTableError, formatter::FsFormatter, formatter::zero_data_region,
    utils::time_utils::now_utc,
};
use crate::fs::slofs::{
    allocator::SloAllocator, constant::*, meta::SloMeta, table::SloTable, types::*,
};

/// Options for `mkfs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SloFormatOptions {
    /// Zero-fill the data region too.
    pub full_format: bool,
    /// Overwrite a store that already holds a slofs image.
    pub force: bool,
}

pub struct SloFormatter<'a, IO: BlockIO + ?Sized> {
    io: &'a mut IO,
    meta: &'a SloMeta,
}

impl<'a, IO: BlockIO + ?Sized> FsFormatter for SloFormatter<'a, IO> {
    fn format(&mut self, full_format: bool) -> FsFormatterResult {
        self.meta.validate()?;
        let now = now_utc();

        // Invalidate first so a half-written format never mounts.
        self.io
            .zero_fill(SLO_SUPERBLOCK_OFFSET, SLO_SUPERBLOCK_SIZE)?;

        let mut alloc = SloAllocator::new(self.meta);
        alloc.commit(self.io)?;

        let layout = self.meta.layout;
        self.io.zero_fill(
            self.meta.block_offset(layout.table_start),
            layout.table_blocks as usize * self.meta.block_size as usize,
        )?;

        let mut table = SloTable::new(self.meta);
        let root = table
            .create(self.io, SloNodeKind::Dir, None, now)
            .map_err(|e| match e {
                FsTableError::IO(io) => FsFormatterError::IO(io),
                _ => FsFormatterError::Other("cannot write root record"),
            })?;
        if root.fileno != SLO_ROOT_FILENO {
            return Err(FsFormatterError::Other("root record not in first slot"));
        }

        if full_format {
            zero_data_region(self.io, self.meta)?;
        }

        let sb = SloSuperblock::from_meta(self.meta, now);
        self.io.write_struct(SLO_SUPERBLOCK_OFFSET, &sb)?;
        self.flush()?;

        info!(
            block_size = self.meta.block_size,
            blocks = self.meta.block_count,
            records = self.meta.record_count,
            data_start = layout.data_start,
            full_format,
            "slofs volume formatted"
        );
        Ok(())
    }

    fn flush(&mut self) -> FsFormatterResult {
        self.io.flush()?;
        Ok(())
    }
}

impl<'a, IO: BlockIO + ?Sized> SloFormatter<'a, IO> {
    pub fn new(io: &'a mut IO, meta: &'a SloMeta) -> Self {
        Self { io, meta }
    }

    /// `true` if the store starts with the slofs signature.
    pub fn is_formatted(io: &mut IO) -> FsFormatterResult<bool> {
        let magic = io.read_u32_at(SLO_SUPERBLOCK_OFFSET)?;
        Ok(magic == u32::from_le_bytes(SLO_MAGIC))
    }

    /// Formats unless the store already holds a volume and `force` is unset.
    pub fn format_with(&mut self, opts: &SloFormatOptions) -> FsFormatterResult {
        if !opts.force && Self::is_formatted(self.io)? {
            return Err(FsFormatterError::AlreadyFormatted);
        }
        self.format(opts.full_format)
    }
}
