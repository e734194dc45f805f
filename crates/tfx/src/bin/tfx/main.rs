mod cli;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("TFX_LOG"))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        for error in e.chain() {
            eprintln!("{error}");
        }
        std::process::exit(1);
    }
}

fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let rules = match &cli.rules {
        Some(path) => tfx::config::RuleSet::load(path)?,
        None => tfx::config::RuleSet::builtin(),
    };

    let config = tfx::config::Config {
        output_dir: cli.output_dir,
        backup: !cli.no_backup,
        format: !cli.no_format,
        templating: cli.with_templating,
        rules,
    };

    let processor = tfx::processor::Processor::new(config);
    let report = processor.process_file(&cli.terraform_file)?;

    if report.written_files.is_empty() {
        println!("No configurations were processed");
        return Ok(());
    }

    println!("Processed {} configuration file(s):", report.written_files.len());
    for file in &report.written_files {
        println!("  {}", file.display());
    }
    if report.variables > 0 {
        println!("Extracted {} variable(s) into overrides blocks", report.variables);
    }
    println!();
    println!("Next steps:");
    println!("1. Review the generated configuration files");
    println!("2. Run 'terraform plan' to verify the changes");

    Ok(())
}
