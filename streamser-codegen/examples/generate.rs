//! Example generation run over a small annotated model.
//!
//! Run with: `cargo run --example generate`

use std::path::Path;

const MODEL: &str = r"
use std::rc::Weak;

#[ser]
pub enum Mood {
    Happy,
    Sleepy,
}

#[ser]
pub struct Person {
    pub name: String,
    pub age: Option<i64>,
    pub pets: Vec<Pet>,
}

#[ser]
pub struct Pet {
    pub owner: Weak<Person>,
    pub name: String,
    pub mood: Mood,
}
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let sources = vec![("demo::model".to_string(), MODEL.to_string())];
    let out_dir = std::env::temp_dir().join("streamser-generate-demo");
    let units = streamser_codegen::generate_to_dir(&sources, Path::new(&out_dir))?;

    for unit in &units {
        println!("=== {} ({})", unit.identity, unit.rel_path.display());
        print!("{}", unit.content);
    }
    println!("wrote {} files under {}", units.len(), out_dir.display());

    Ok(())
}
