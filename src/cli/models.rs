use anyhow::Result;

use crate::chat::ChatClient;

pub async fn run(url: &str, installed: bool) -> Result<()> {
    let client = ChatClient::new(url);

    if installed {
        for line in client.installed_models().await? {
            println!("{}", line);
        }
        return Ok(());
    }

    let available = client.available_models().await?;
    for model in available.models {
        if model == available.default_model {
            println!("{} (default)", model);
        } else {
            println!("{}", model);
        }
    }
    Ok(())
}
