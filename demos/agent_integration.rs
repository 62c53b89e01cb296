use editlayer_sdk::EditLayerClient;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🤖 AI Agent Example - Staging edits with editlayer\n");

    let client = EditLayerClient::new("http://localhost:3030", "example-message");

    if !client.health_check()? {
        eprintln!("Error: editlayer server is not running!");
        eprintln!("Start it with: editlayer start .");
        return Ok(());
    }

    println!("✓ Connected to editlayer server");
    println!();

    println!("📝 Staging new file: src/hello.rs");
    client.create_file(
        "src/hello.rs",
        r#"pub fn greet(name: &str) -> String {
    format!("Hello, {}!", name)
}
"#,
    )?;

    println!("📝 Staging an edit to README.md");
    let readme = client
        .view("README.md", true)?
        .and_then(|view| view.content().map(str::to_string))
        .unwrap_or_default();
    if readme.is_empty() {
        client.create_file("README.md", "# My Project\n\nGreets people.\n")?;
    } else {
        client.modify_file("README.md", &readme, &format!("{readme}\nNow greets people.\n"))?;
    }

    println!("📝 Staging a rename: src/hello.rs -> src/greet.rs");
    client.rename_file("src/hello.rs", "src/greet.rs")?;
    println!();

    let pending = client.pending()?;
    println!("📊 {} staged path(s):", pending.len());
    for composite in &pending {
        println!("  {} {}", composite.kind.as_str(), composite.path);
    }
    println!();

    println!("💾 Committing...");
    let report = client.commit(None)?;
    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!("✓ {}", outcome.path),
            Some(error) => println!("✗ {} - {}", outcome.path, error),
        }
    }
    println!();

    println!("📜 {} path(s) in history", client.history(None)?.len());
    println!();
    println!("Try these commands:");
    println!("  editlayer status    - View staged changes");
    println!("  editlayer diff      - See what would change");
    println!("  editlayer log       - View commit history");

    Ok(())
}
