//! `mnemo init` — Write a starter config file.

use mnemo_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Mnemo — First-Time Setup");
    println!("========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config file already exists: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config file: {}", config_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Set your API key:");
    println!("       export MNEMO_API_KEY='sk-...'   (or OPENAI_API_KEY)");
    println!("  2. Start chatting:");
    println!("       mnemo chat --user alice --organization acme --team platform");

    Ok(())
}
