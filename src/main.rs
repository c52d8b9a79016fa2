mod opt;

use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use hjets::{analyse, Chain, Writer};
use log::{debug, info};

use crate::opt::Opt;

fn main() -> Result<()> {
    let opt = Opt::parse();

    let env = Env::default().filter_or("HJETS_LOG", &opt.loglevel);
    env_logger::init_from_env(env);

    info!("hjets {}", env!("CARGO_PKG_VERSION"));
    debug!("settings: {:#?}", opt);

    let mut chain = Chain::with_layout(opt.weight_selection(), opt.ntuple_layout());
    info!("Input files:");
    for file in &opt.infiles {
        chain
            .add(file)
            .with_context(|| format!("Failed to add {file:?} to input"))?;
    }

    let outfile = File::create(&opt.outfile)
        .with_context(|| format!("Failed to create {:?}", opt.outfile))?;
    info!("Output file: {}", opt.outfile.display());

    let (histograms, summary) = analyse(chain, opt.analysis_config())
        .context("Failed to read events")?;
    summary.log();

    let mut writer = Writer::new(BufWriter::new(outfile));
    for histo in histograms.iter() {
        writer
            .write_histogram(histo)
            .with_context(|| format!("Failed to write {:?}", opt.outfile))?;
    }
    writer
        .finish()
        .with_context(|| format!("Failed to write {:?}", opt.outfile))?;
    info!("Done");
    Ok(())
}
