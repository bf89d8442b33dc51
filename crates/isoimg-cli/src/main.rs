use clap::Parser;

mod cli;

fn main() {
  pretty_env_logger::init();

  if let Err(err) = run(cli::Cli::parse()) {
    eprintln!("error: {err}");
    std::process::exit(1);
  }
}

fn run(cli: cli::Cli) -> Result<(), Box<dyn std::error::Error>> {
  match cli.command {
    cli::Command::Create {
      output,
      directory,
      volume_id,
    } => {
      let mut writer = isoimg::ImageWriter::new();
      writer.primary.volume_identifier = volume_id;
      writer.add_local_directory(&directory, "")?;

      let file = std::fs::File::create(&output)?;
      writer.write_to(std::io::BufWriter::new(file))?;
      log::info!("wrote {}", output.display());
    }
  }

  Ok(())
}
