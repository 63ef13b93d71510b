use anyhow::{bail, Result};
use bamdex::IndexerBuilder;

pub fn main() -> Result<()> {
    env_logger::init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: index <file.bam> [chrom:start-end]");
    };
    let index = IndexerBuilder::default()
        .allow_unplaced(true)
        .build()
        .index_path(&path)?;
    eprintln!(
        "Indexed {} records over {} references ({} unplaced)",
        index.n_records(),
        index.len(),
        index.unplaced_records()
    );

    for (id, reference) in index.references().iter().enumerate() {
        let name = index.header().reference_name(id).unwrap_or("?");
        println!(
            "{name}\t{} bins\t{} chunks\t{} windows",
            reference.bins().len(),
            reference.n_chunks(),
            reference.linear_index().len()
        );
    }

    if let Some(region) = std::env::args().nth(2) {
        let Some((name, range)) = region.split_once(':') else {
            bail!("region must look like chrom:start-end");
        };
        let Some((start, end)) = range.split_once('-') else {
            bail!("region must look like chrom:start-end");
        };
        let (start, end): (u32, u32) = (start.parse()?, end.parse()?);
        let Some(ref_id) = index.reference_id(name) else {
            bail!("unknown reference {name}");
        };

        let floor = index.linear_offset(ref_id, start);
        for chunk in index.chunks_overlapping(ref_id, start, end) {
            let begin = floor.map_or(chunk.start, |f| f.max(chunk.start));
            if begin < chunk.end {
                println!("{begin}\t{}", chunk.end);
            }
        }
    }
    Ok(())
}
