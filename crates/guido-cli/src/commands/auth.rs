use anyhow::{anyhow, Result};
use console::style;

use guido::configuration::{to_env_var, Settings};
use guido::factory::google_auth;

pub async fn execute() -> Result<()> {
    let settings = Settings::new()?;
    let Some(auth) = google_auth(&settings)? else {
        return Err(anyhow!(
            "No calendar configured. Set {} and {} first.",
            to_env_var("calendar.id"),
            to_env_var("calendar.credentials_json")
        ));
    };

    println!("Opening your browser to authorize calendar access...");
    auth.authorize().await?;
    println!("{}", style("Calendar access authorized").green());
    Ok(())
}
