use textgen_service::{TrainConfig, logging::init_tracing, training};

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = TrainConfig::from_env()?;
    tracing::info!(
        samples = %config.samples_path.display(),
        epochs = config.num_epochs,
        ?config.device,
        "starting training run"
    );

    let summary = training::run(&config)?;
    tracing::info!(
        weights = %summary.weights_path.display(),
        examples = summary.examples,
        vocab_size = summary.vocab_size,
        loss = summary.final_loss,
        "training finished"
    );
    Ok(())
}
