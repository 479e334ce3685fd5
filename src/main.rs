//! Trains a negative-sampling CBOW model on a text file and prints the
//! nearest neighbours of the query words.

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustynlp::config::TrainConfig;
use rustynlp::data::{create_contexts_target, preprocess};
use rustynlp::metrics::{analogy, most_similar};
use rustynlp::models::Cbow;
use rustynlp::trainer::Trainer;
use std::fs;
use std::path::PathBuf;

const DEFAULT_TEXT: &str = "You say goodbye and I say hello.";

/// Аргументы командной строки
#[derive(Parser, Debug)]
#[command(author, version, about = "RustyNLP: CBOW word-vector training", long_about = None)]
struct Args {
    /// Текстовый корпус; без него используется короткое встроенное предложение
    #[arg(short, long)]
    text: Option<PathBuf>,

    /// JSON-файл с параметрами обучения
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Переопределяет max_epoch из конфигурации
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Слова, для которых вывести ближайших соседей
    #[arg(short, long, num_args = 1.., default_value = "you")]
    query: Vec<String>,

    /// Аналогия `a b c` (a : b = c : ?)
    #[arg(long, num_args = 3, value_names = ["A", "B", "C"])]
    analogy: Option<Vec<String>>,

    /// Сколько соседей выводить
    #[arg(long, default_value_t = 5)]
    top: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrainConfig::from_path(path)?,
        None => TrainConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config = config.with_max_epoch(epochs);
    }
    config.validate()?;

    let text = match &args.text {
        Some(path) => fs::read_to_string(path)?,
        None => DEFAULT_TEXT.to_string(),
    };
    let (corpus, vocab) = preprocess(&text);
    let (contexts, target) = create_contexts_target(&corpus, config.window_size)?;
    log::info!(
        "corpus: {} tokens, {} distinct words, {} training pairs",
        corpus.len(),
        vocab.len(),
        contexts.nrows()
    );

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let model = Cbow::with_sampling(
        vocab.len(),
        config.hidden_size,
        config.window_size,
        &corpus,
        config.sample_size,
        config.power,
        &mut rng,
    )?;

    let mut trainer = Trainer::new(model, config.optimizer())
        .eval_interval(config.eval_interval)
        .with_rng(StdRng::from_rng(&mut rng));
    trainer.fit(&contexts, &target, config.max_epoch, config.batch_size)?;

    let vecs = trainer.model().word_vecs();
    for query in &args.query {
        println!("\n[query] {}", query);
        match most_similar(query, &vocab, &vecs, args.top) {
            Ok(neighbours) => {
                for (word, score) in neighbours {
                    println!(" {}: {:.4}", word, score);
                }
            }
            Err(e) => eprintln!(" {}", e),
        }
    }

    if let Some(words) = &args.analogy {
        if let [a, b, c] = words.as_slice() {
            println!("\n[analogy] {} : {} = {} : ?", a, b, c);
            for (word, score) in analogy(a, b, c, &vocab, &vecs, args.top)? {
                println!(" {}: {:.4}", word, score);
            }
        }
    }
    Ok(())
}
