use data_loader::{Corpus, CorpusSources};
use std::path::Path;
use std::time::Instant;

fn main() {
    let data_dir = Path::new("data");
    let sources = CorpusSources::in_dir(data_dir);

    println!("Building movie corpus from {:?}...\n", data_dir);

    let start = Instant::now();
    let corpus = Corpus::build(&sources).expect("Failed to build corpus");
    let elapsed = start.elapsed();

    let with_credits = corpus
        .records()
        .iter()
        .filter(|r| !r.cast_top.is_empty())
        .count();
    let with_links = corpus.records().iter().filter(|r| r.imdb_id.is_some()).count();

    println!("\n=== Build Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Movies: {}", corpus.len());
    println!("With cast: {}", with_credits);
    println!("With IMDb link: {}", with_links);
    println!(
        "\nPerformance: {:.0} movies/second",
        corpus.len() as f64 / elapsed.as_secs_f64()
    );
}
