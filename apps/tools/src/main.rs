use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::domain::{AlumniId, TagId, ThreadId};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/alumni.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateAlumnus {
        email: String,
        first_name: String,
        last_name: String,
    },
    CreateTag {
        name: String,
    },
    CreateThread {
        author_id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    TagThread {
        thread_id: i64,
        tag_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateAlumnus {
            email,
            first_name,
            last_name,
        } => {
            let alumni_id = storage
                .create_alumnus(&email, &first_name, &last_name)
                .await?;
            println!("created alumni_id={alumni_id}");
        }
        Command::CreateTag { name } => match storage.create_tag(name.trim()).await? {
            Some(tag_id) => println!("created tag_id={tag_id}"),
            None => bail!("tag '{name}' already exists"),
        },
        Command::CreateThread {
            author_id,
            title,
            description,
        } => {
            let thread_id = storage
                .create_thread(AlumniId(author_id), &title, description.as_deref())
                .await?;
            println!("created thread_id={thread_id}");
        }
        Command::TagThread { thread_id, tag_id } => {
            let thread_id = ThreadId(thread_id);
            if !storage.thread_exists(thread_id).await? {
                bail!("thread {thread_id} does not exist");
            }
            storage.tag_thread(thread_id, TagId(tag_id)).await?;
            let names: Vec<String> = storage
                .tags_for_thread(thread_id)
                .await?
                .into_iter()
                .map(|tag| tag.name)
                .collect();
            println!("thread {thread_id} tags: {}", names.join(", "));
        }
    }

    Ok(())
}
