use anyhow::Result;
use cliclack::input;
use console::style;

use guido::configuration::Settings;
use guido::factory::build_agent;
use guido::mode::Mode;
use guido::transcript::Transcript;

use crate::output::render_reply;

fn is_exit(message: &str) -> bool {
    matches!(
        message.trim().to_lowercase().as_str(),
        "exit" | "quit" | "q"
    )
}

pub async fn execute(speech: bool) -> Result<()> {
    let settings = Settings::new()?;
    let agent = build_agent(&settings)?;
    let mode = if speech { Mode::Speech } else { Mode::Text };
    let mut transcript = Transcript::with_mode(mode)?;

    println!(
        "{} {}",
        style("guido").bold().green(),
        style("- type \"exit\" to end the session").dim()
    );
    println!();

    loop {
        let message: String = input("Message:").placeholder("").interact()?;
        if is_exit(&message) {
            break;
        }
        if message.trim().is_empty() {
            continue;
        }

        if let Err(e) = render_reply(
            &agent,
            &mut transcript,
            message,
            mode,
            &settings.speech.player,
        )
        .await
        {
            eprintln!("{} {}", style("Error:").red().bold(), e);
        }
        println!();
    }
    Ok(())
}
