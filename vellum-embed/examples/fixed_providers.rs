//! Demonstrates the deterministic fixed providers: embed a couple of texts,
//! show that identical input yields identical vectors, and run a canned
//! generation. No network or model files required.
//!
//! Run with: `cargo run -p vellum-embed --example fixed_providers`

use vellum_embed::ProviderConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (embedder, generator) = ProviderConfig::fixed().with_embedding_dimension(8).build()?;

    let question = "What is the refund policy?";
    let first = embedder.embed(question).await?;
    let second = embedder.embed(question).await?;

    println!("dimension: {}", embedder.dimension());
    println!("vector:    {first:?}");
    println!("stable:    {}", first == second);

    let answer = generator.generate("Answer from context: ...").await?;
    println!("answer:    {answer}");

    Ok(())
}
