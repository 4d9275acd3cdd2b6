use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use ephys_converter::{convert, ConvertConfig, DecoderRegistry};

#[derive(Parser)]
#[command(
    name = "ephys-convert",
    version,
    about = "Convert fragmented electrophysiology recordings to flat binary sample files",
    long_about = "Reads a recording, selects its spike-continuous channels and writes a\n\
                  channel-major i16 .dat file, a per-sample time map, the strobed event log\n\
                  and optional analog-input/LFP tables into the output folder."
)]
struct Cli {
    /// Recording to convert
    source: PathBuf,

    /// Output folder (default: "converted" next to the source)
    #[arg(long, short)]
    output_folder: Option<PathBuf>,

    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Apply common-average referencing
    #[arg(long)]
    car: bool,

    /// Remove artifact samples
    #[arg(long)]
    remove_artifacts: bool,

    /// Persist the artifact detection series for plotting (needs --remove-artifacts)
    #[arg(long)]
    remove_artifacts_visualize: bool,

    /// Explicit vendor channel numbers (default: heuristic selection)
    #[arg(long, num_args = 1..)]
    channels: Option<Vec<u32>>,

    /// Persist a per-channel voltage summary
    #[arg(long)]
    plot_probe_voltage: bool,

    /// Extract LFP channels
    #[arg(long)]
    lfp: bool,

    /// Extract analog-input channels
    #[arg(long)]
    ai: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> ephys_converter::Result<(PathBuf, ConvertConfig)> {
        let mut config = match &self.config {
            Some(path) => ConvertConfig::from_json_file(path)?,
            None => ConvertConfig::default(),
        };

        if self.output_folder.is_some() {
            config.output_folder = self.output_folder;
        }
        if self.channels.is_some() {
            config.specific_channels = self.channels;
        }
        config.common_average_referencing |= self.car;
        config.remove_artifacts |= self.remove_artifacts;
        config.remove_artifacts_visualize |= self.remove_artifacts_visualize;
        config.plot_probe_voltage |= self.plot_probe_voltage;
        config.extract_lfp |= self.lfp;
        config.extract_ai |= self.ai;

        Ok((self.source, config))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = cli
        .into_config()
        .and_then(|(source, config)| convert(&source, &config, &DecoderRegistry::default()));

    match result {
        Ok(output) => {
            println!(
                "{} channels x {} samples written to {}",
                output.num_channels(),
                output.num_samples(),
                output.dat_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
