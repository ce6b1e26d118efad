use std::env;
use std::error::Error;

use log::debug;
use meal_planner_sync::{DetailOutcome, MealPlanner, Recipe, RecipeCard, RecipeId, Tab};

const USAGE: &str = "Usage:
  meal-planner search <term> [--pages N]
  meal-planner favourites
  meal-planner summary <recipe-id>
  meal-planner favourite add|remove <recipe-id>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().ok_or(USAGE)?;

    let planner = MealPlanner::builder().build()?;
    debug!("backend gateway: {}", planner.gateway().gateway_name());

    match command.as_str() {
        "search" => search(&planner, &args[1..]).await,
        "favourites" => {
            planner.start().await;
            print_cards(&planner.cards(Tab::Favourites));
            Ok(())
        }
        "summary" => {
            let id = parse_id(args.get(1))?;
            match planner.detail().open(id).await {
                DetailOutcome::Ready(summary) => {
                    println!("# {}\n", summary.title);
                    println!("{}", summary.plain_text());
                    Ok(())
                }
                DetailOutcome::Failed(message) => Err(message.into()),
                DetailOutcome::Discarded => Ok(()),
            }
        }
        "favourite" => {
            let favourite = match args.get(1).map(String::as_str) {
                Some("add") => true,
                Some("remove") => false,
                _ => return Err(USAGE.into()),
            };
            let id = parse_id(args.get(2))?;

            planner.start().await;
            let recipe = planner
                .favourites()
                .favourites()
                .into_iter()
                .find(|r| r.id == id)
                .unwrap_or_else(|| Recipe::new(id, ""));
            planner.favourites().set_favourite(&recipe, favourite).await?;
            print_cards(&planner.cards(Tab::Favourites));
            Ok(())
        }
        _ => Err(USAGE.into()),
    }
}

async fn search(planner: &MealPlanner, args: &[String]) -> Result<(), Box<dyn Error>> {
    let term = args.first().ok_or("search requires a term")?;
    let pages = match args.iter().position(|a| a == "--pages") {
        Some(index) => args
            .get(index + 1)
            .ok_or("--pages requires a number")?
            .parse::<u32>()?,
        None => 1,
    };

    planner.start().await;
    planner.search().submit(term).await?;
    for _ in 1..pages {
        planner.search().load_more().await?;
    }

    print_cards(&planner.cards(Tab::Search));
    Ok(())
}

fn parse_id(arg: Option<&String>) -> Result<RecipeId, Box<dyn Error>> {
    let arg = arg.ok_or("a recipe id is required")?;
    Ok(arg.parse::<RecipeId>()?)
}

fn print_cards(cards: &[RecipeCard]) {
    if cards.is_empty() {
        println!("No recipes.");
        return;
    }
    for card in cards {
        let marker = if card.is_favourite { "♥" } else { " " };
        println!("{} {:>8}  {}", marker, card.recipe.id, card.recipe.display_title());
    }
}
