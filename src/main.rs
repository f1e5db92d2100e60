// main.rs
// Description: Binary entry point with menu loop. Collects training examples, trains the
//              output layer on them, generates continuations, and saves or loads checkpoints.
// History:
// - 2026-10-18: Menu mirrors the example list / train / generate workflow.
// - 2026-10-18: Seed from TINY_LM_SEED for reproducible sessions.

use std::io::Write;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};

use tiny_lm::train::{self, Dataset};
use tiny_lm::{checkpoint, ModelConfig, TinyTransformer, Vocab, EMBEDDING_DIM, HIDDEN_DIM, MAX_SEQ_LEN};

const S_DATASET_PATH: &str = "data/dataset.json";
const S_DEFAULT_CHECKPOINT_PATH: &str = "checkpoints/tiny_lm_checkpoint.json";
const I_GENERATE_TOKENS: usize = 12;

fn read_line_trimmed() -> Result<String, String> {
    let mut s_input = String::new();
    std::io::stdin()
        .read_line(&mut s_input)
        .map_err(|_| "input_read_error".to_string())?;
    Ok(s_input.trim().to_string())
}

fn prompt(s_label: &str) -> Option<String> {
    print!("{}", s_label);
    let _ = std::io::stdout().flush();
    match read_line_trimmed() {
        Ok(s) => Some(s),
        Err(e) => {
            println!("Input error: {}", e);
            None
        }
    }
}

fn rng_from_env() -> StdRng {
    match std::env::var("TINY_LM_SEED").ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(u64_seed) => {
            info!(seed = u64_seed, "using fixed seed");
            StdRng::seed_from_u64(u64_seed)
        }
        None => StdRng::from_os_rng(),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let vocab = Vocab::default();
    let mut rng = rng_from_env();

    let config = ModelConfig::new(vocab.len(), EMBEDDING_DIM, HIDDEN_DIM, MAX_SEQ_LEN);
    let mut model = match TinyTransformer::new(config, &mut rng) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "model construction failed");
            return;
        }
    };

    let mut dataset = match Dataset::load(S_DATASET_PATH) {
        Ok(ds) => ds,
        Err(e) => {
            error!(error = %e, path = S_DATASET_PATH, "dataset load failed, starting empty");
            Dataset::new()
        }
    };

    println!("\n=== MODEL INFORMATION ===");
    println!("Network architecture: {}", model.network_description());
    println!(
        "Model configuration -> max_seq_len: {}, embedding_dim: {}, hidden_dim: {}",
        MAX_SEQ_LEN, EMBEDDING_DIM, HIDDEN_DIM
    );
    println!("Total parameters: {}", model.parameter_count());

    let mut s_checkpoint_path: String = S_DEFAULT_CHECKPOINT_PATH.to_string();

    loop {
        println!("\n--- Menu Mode ---");
        println!("Commands:");
        println!("  a Add example");
        println!("  d Show examples");
        println!("  c Clear examples");
        println!("  t Train on all examples");
        println!("  g Generate");
        println!("  s Save checkpoint");
        println!("  l Load checkpoint");
        println!("  e Exit");

        let s_cmd = match prompt("\nEnter command: ") {
            Some(s) => s.to_lowercase(),
            None => continue,
        };

        match s_cmd.as_str() {
            "e" => {
                println!("Exit.");
                break;
            }
            "a" => {
                let Some(s_in) = prompt("Input: ") else { continue };
                let Some(s_out) = prompt("Output: ") else { continue };
                if let Err(e) = dataset.add(&s_in, &s_out) {
                    println!("Not added: {}", e);
                    continue;
                }
                if let Err(e) = dataset.save(S_DATASET_PATH) {
                    error!(error = %e, "dataset save failed");
                }
                println!("{}", dataset.render());
            }
            "d" => println!("{}", dataset.render()),
            "c" => {
                dataset.clear();
                if let Err(e) = dataset.save(S_DATASET_PATH) {
                    error!(error = %e, "dataset save failed");
                }
                println!("{}", dataset.render());
            }
            "t" => {
                let report = train::train_all(&mut model, &vocab, &dataset);
                println!("Training complete on {} examples.", report.examples);
            }
            "g" => {
                let Some(s_text) = prompt("Enter prompt: ") else { continue };
                let v_ids = train::encode_prompt(&vocab, &s_text, model.max_seq_len());
                match model.generate(&v_ids, I_GENERATE_TOKENS, &mut rng) {
                    Ok(v_out) => println!("Model output: {}", vocab.decode(&v_out)),
                    Err(e) => println!("Model output error: {}", e),
                }
            }
            "s" | "l" => {
                let Some(s_path) = prompt("Enter checkpoint path or press Enter for default: ") else {
                    continue;
                };
                if !s_path.is_empty() {
                    s_checkpoint_path = s_path;
                }
                if s_cmd == "s" {
                    match checkpoint::save(&model, &s_checkpoint_path) {
                        Ok(()) => println!("Saved checkpoint: {}", s_checkpoint_path),
                        Err(e) => println!("Save failed: {}", e),
                    }
                } else {
                    match checkpoint::load(&s_checkpoint_path) {
                        Ok(m) if m.vocab_size() == vocab.len() => {
                            model = m;
                            println!("Loaded checkpoint: {}", s_checkpoint_path);
                        }
                        Ok(m) => println!(
                            "Load failed: checkpoint vocab size {} does not match {}",
                            m.vocab_size(),
                            vocab.len()
                        ),
                        Err(e) => println!("Load failed: {}", e),
                    }
                }
            }
            _ => println!("Unknown command."),
        }
    }
}
