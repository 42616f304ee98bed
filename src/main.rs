use std::env;
use std::fs::File;
use std::io::BufReader;

use anyhow::{bail, Result};

use seqindex::{Indexer, NumericCorpus};

fn main() -> Result<()> {
    let Some(path) = env::args().nth(1) else {
        bail!("Usage: seqindex <FILE>");
    };

    let handle = File::open(&path).map(BufReader::new)?;
    let mut indexer = Indexer::new(handle);
    indexer.build(&NumericCorpus)?;

    let index = indexer.index();
    eprintln!(
        "Indexed {} into {} chunks ({} sequences, {} samples, ids: {})",
        path,
        index.chunks().len(),
        index.num_sequences(),
        index.num_samples(),
        indexer.has_sequence_ids(),
    );
    index.pprint();

    Ok(())
}
