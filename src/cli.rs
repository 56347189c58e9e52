use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "flowbeat",
    version,
    about = "EEG-driven binaural beat optimizer",
    long_about = "Streams live EEG, estimates bandpower in a target band over a sliding\n\
                  window, and adapts a binaural-beat stimulus to maximize it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the YAML configuration file
    #[arg(long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print raw EEG samples until interrupted
    Stream,
    /// Play a fixed binaural beat
    Beats(BeatsArgs),
    /// Run the adaptive neurofeedback loop
    Optimize,
}

#[derive(Args)]
pub struct BeatsArgs {
    /// Carrier frequency in Hz (defaults to initial.carrier)
    #[arg(long)]
    pub carrier: Option<f32>,

    /// Split between the ears in Hz (defaults to initial.split)
    #[arg(long)]
    pub split: Option<f32>,

    /// Playback duration in seconds (defaults to optimizer.window_size)
    #[arg(long)]
    pub duration: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beats_overrides_parse() {
        let cli = Cli::parse_from(["flowbeat", "beats", "--carrier", "300", "--split", "6"]);
        match cli.command {
            Command::Beats(args) => {
                assert_eq!(args.carrier, Some(300.0));
                assert_eq!(args.split, Some(6.0));
                assert_eq!(args.duration, None);
            }
            _ => panic!("expected beats subcommand"),
        }
    }

    #[test]
    fn global_flags_apply_after_the_subcommand() {
        let cli = Cli::parse_from(["flowbeat", "optimize", "-vv", "--config", "alt.yaml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from("alt.yaml"));
        assert!(matches!(cli.command, Command::Optimize));
    }
}
