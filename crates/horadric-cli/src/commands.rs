//! Command handlers
//!
//! Handlers write their report to any `Write` so they can be driven from
//! tests as well as from `main`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use horadric_formats::dcc::{DccFile, DecodedDirection};
use horadric_formats::mpq::{Archive, ArchiveRegistry, parse_listfile};
use tracing::{debug, info};

fn find_archive<'a>(registry: &'a mut ArchiveRegistry, name: &str) -> Result<&'a mut Archive> {
    let id = registry
        .iter()
        .find(|(_, registered, _)| registered.eq_ignore_ascii_case(name))
        .map(|(id, _, _)| id)
        .ok_or_else(|| anyhow!("archive {name} is not open"))?;
    registry
        .archive_mut(id)
        .ok_or_else(|| anyhow!("archive {name} is not open"))
}

/// List files present in `archive`
pub fn list(
    registry: &mut ArchiveRegistry,
    archive: &str,
    listfile: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    let target = find_archive(registry, archive)?;
    let names = match listfile {
        Some(path) => {
            let data = fs::read(path)
                .with_context(|| format!("failed to read listfile {}", path.display()))?;
            parse_listfile(&data)
        }
        None => target
            .read_listfile()
            .with_context(|| format!("{archive} has no usable (listfile)"))?,
    };
    debug!("Checking {} candidate names against {}", names.len(), archive);

    let files = target.list_files(&names);
    for file in &files {
        writeln!(
            out,
            "{:>10} {:>10}  {:08x}  {}",
            file.file_size,
            file.compressed_size,
            file.flags.bits(),
            file.name
        )?;
    }
    info!("{} of {} listed names present in {}", files.len(), names.len(), archive);
    Ok(())
}

/// Destination for an extracted file: the last path component of `name`
pub fn default_output(name: &str) -> PathBuf {
    let file_name = name.rsplit(['\\', '/']).next().unwrap_or(name);
    PathBuf::from(file_name)
}

/// Extract `name` to `output`
pub fn extract(
    registry: &mut ArchiveRegistry,
    name: &str,
    output: Option<&Path>,
    from: Option<&str>,
) -> Result<PathBuf> {
    let data = registry
        .read_file(name, from)
        .with_context(|| format!("failed to read {name}"))?;
    let output = output.map_or_else(|| default_output(name), Path::to_path_buf);
    fs::write(&output, &data)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("Extracted {} ({} bytes) to {}", name, data.len(), output.display());
    Ok(output)
}

/// Print header and table summary of `archive`
pub fn inspect(registry: &mut ArchiveRegistry, archive: &str, out: &mut impl Write) -> Result<()> {
    let target = find_archive(registry, archive)?;
    let offset = target.archive_offset()?;
    let header = target.header()?;
    writeln!(out, "Archive:        {archive}")?;
    writeln!(out, "Header offset:  0x{offset:x}")?;
    writeln!(out, "Format version: {}", header.format_version)?;
    writeln!(out, "Archive size:   {}", header.archive_size)?;
    writeln!(out, "Sector size:    {}", header.sector_size())?;
    writeln!(
        out,
        "Hash table:     {} entries at 0x{:x}",
        header.hash_table_count, header.hash_table_pos
    )?;
    writeln!(
        out,
        "Block table:    {} entries at 0x{:x}",
        header.block_table_count, header.block_table_pos
    )?;

    let hash_table = target.hash_table()?;
    let live = hash_table.entries().iter().filter(|entry| entry.is_live()).count();
    let deleted = hash_table.entries().iter().filter(|entry| entry.is_deleted()).count();
    writeln!(out, "Hash slots:     {live} live, {deleted} deleted")?;

    let block_table = target.block_table()?;
    let present = block_table.entries().iter().filter(|entry| entry.is_present()).count();
    writeln!(out, "Blocks present: {present}")?;
    Ok(())
}

fn write_direction(index: usize, direction: &DecodedDirection, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "Direction {index}: {}x{} at ({}, {}), {} frames, {} palette entries, flags {:?}",
        direction.bounds.width(),
        direction.bounds.height(),
        direction.bounds.min_x,
        direction.bounds.min_y,
        direction.frames.len(),
        direction.palette.len(),
        direction.header.flags
    )?;
    for (number, frame) in direction.frames.iter().enumerate() {
        writeln!(
            out,
            "  frame {number}: {}x{} at ({}, {})",
            frame.bounds.width(),
            frame.bounds.height(),
            frame.bounds.min_x,
            frame.bounds.min_y
        )?;
    }
    Ok(())
}

/// Decode `name` and summarize its directions
pub fn dcc(
    registry: &mut ArchiveRegistry,
    name: &str,
    direction: Option<usize>,
    out: &mut impl Write,
) -> Result<()> {
    let data = registry
        .read_file(name, None)
        .with_context(|| format!("failed to read {name}"))?;
    let file = DccFile::from_vec(data).with_context(|| format!("{name} is not a DCC file"))?;
    writeln!(
        out,
        "{name}: {} directions, {} frames each",
        file.direction_count(),
        file.frames_per_direction()
    )?;

    let indices: Vec<usize> = match direction {
        Some(index) => vec![index],
        None => (0..file.direction_count()).collect(),
    };
    for index in indices {
        let decoded = file
            .decode_direction(index)
            .with_context(|| format!("failed to decode direction {index} of {name}"))?;
        write_direction(index, &decoded, out)?;
    }
    Ok(())
}
