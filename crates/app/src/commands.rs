use std::error::Error;
use std::io::{BufRead, Write};

use services::{AppController, DeckPage, ErrorKind, SessionView};
use spaced_core::model::{DeckId, OrderMode, Outcome, RepeatMode, SessionState};
use tracing::{info, warn};

use crate::args::{Command, ReviewFlags, Settings};

type CmdResult = Result<(), Box<dyn Error>>;

/// Run one subcommand against the controller, writing results to `out`.
///
/// `input` is only read by `review`.
pub async fn execute(
    controller: &mut AppController,
    command: Command,
    settings: &Settings,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> CmdResult {
    match command {
        Command::Help => {
            crate::args::print_usage();
            Ok(())
        }
        Command::Decks => {
            let page = controller.deck_page(settings.page).await?;
            print_decks(&page, out)
        }
        Command::CreateDeck { name } => {
            let id = controller.create_deck(&name).await?;
            writeln!(out, "created deck {id}")?;
            Ok(())
        }
        Command::DeleteDeck { deck_id } => {
            let report = controller.delete_deck(deck_id).await?;
            writeln!(
                out,
                "deleted deck {deck_id} and {} card(s)",
                report.cards_removed.len()
            )?;
            Ok(())
        }
        Command::AddCard { deck_id, front, back } => {
            controller.select_deck(deck_id).await?;
            let card = controller.add_card(&front, &back).await?;
            writeln!(out, "added card {} to deck {deck_id}", card.id())?;
            Ok(())
        }
        Command::DeleteCard { card_id } => {
            if controller.delete_card(card_id).await? {
                writeln!(out, "deleted card {card_id}")?;
            } else {
                writeln!(out, "card {card_id} was already gone")?;
            }
            Ok(())
        }
        Command::Cards { deck_id } => {
            let deck = controller.deck_service().require_deck(deck_id).await?;
            let cards = controller.card_service().cards_for_deck(deck_id).await?;
            writeln!(out, "{} ({} cards)", deck.name(), cards.len())?;
            for card in cards {
                writeln!(
                    out,
                    "{:>5}  {} / {}  {}% of {}, {} missed  next {}",
                    card.id(),
                    card.front(),
                    card.back(),
                    card.correct_answer_ratio(),
                    card.total_answer_count(),
                    card.incorrect_count(),
                    card.next_review_date(),
                )?;
            }
            Ok(())
        }
        Command::Review { deck_id, flags } => review(controller, deck_id, flags, input, out).await,
        Command::Seed => {
            let ids = controller.seed_samples().await?;
            if ids.is_empty() {
                writeln!(out, "store already has decks, nothing seeded")?;
            } else {
                writeln!(out, "seeded {} sample decks", ids.len())?;
            }
            Ok(())
        }
    }
}

fn print_decks(page: &DeckPage, out: &mut impl Write) -> CmdResult {
    if page.items.is_empty() {
        writeln!(out, "no decks")?;
        return Ok(());
    }
    for item in &page.items {
        let marker = if item.due_status.is_due() { '*' } else { ' ' };
        writeln!(
            out,
            "{marker}{:>4}  {:<20} {:>3} cards  next {} ({:+} d)  saved {:.1}%",
            item.deck_id,
            item.name,
            item.card_count,
            item.next_review_date,
            item.days_until_due,
            item.time_saved_percent,
        )?;
    }
    writeln!(
        out,
        "page {}/{}, {} due",
        page.page_number, page.page_count, page.due_count
    )?;
    Ok(())
}

//
// ─── INTERACTIVE REVIEW ────────────────────────────────────────────────────────
//

fn print_prompt(view: &SessionView, out: &mut impl Write) -> CmdResult {
    let progress = &view.progress;
    let side = if view.showing_front { "front" } else { "back" };
    writeln!(
        out,
        "[{}/{} round {}] {side}: {}",
        progress.answered,
        progress.total,
        progress.round,
        view.visible_face.as_deref().unwrap_or(""),
    )?;
    write!(out, "(y) knew it  (n) missed  (f) flip  (q) quit > ")?;
    out.flush()?;
    Ok(())
}

async fn review(
    controller: &mut AppController,
    deck_id: DeckId,
    flags: ReviewFlags,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> CmdResult {
    controller.select_deck(deck_id).await?;
    controller.set_order_mode(if flags.random {
        OrderMode::Random
    } else {
        OrderMode::Sequential
    });
    controller.set_reverse_mode(flags.reverse);
    controller.set_repeat_mode(if flags.strict {
        RepeatMode::StrictRepeat
    } else {
        RepeatMode::AllRepeat
    });
    controller.set_learning_mode(flags.learn);

    let view = controller.start_review(flags.force).await?;
    info!(%deck_id, total = view.progress.total, learning = flags.learn, "review started");

    let mut line = String::new();
    while let Some(view) = controller.session_view() {
        if view.state != SessionState::InProgress {
            break;
        }
        print_prompt(&view, out)?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            controller.cancel_session().await?;
            break;
        }
        let outcome = match line.trim() {
            "y" => Outcome::Correct,
            "n" => Outcome::Incorrect,
            "f" => {
                controller.flip_card()?;
                continue;
            }
            "q" => {
                controller.cancel_session().await?;
                writeln!(out, "review cancelled")?;
                break;
            }
            _ => continue,
        };

        let result = match controller.submit_answer(outcome).await {
            Ok(result) => result,
            Err(err) if err.kind() == ErrorKind::Store => {
                warn!(%deck_id, error = %err, "answer not stored");
                writeln!(out, "could not save ({err}); retrying with the next answer")?;
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        if result.effect.new_round {
            writeln!(out, "new round: going over the missed cards")?;
        }
        if let Some(done) = result.effect.completed {
            let stats = done.stats;
            writeln!(
                out,
                "done: {} answers, {} correct, {} lapses, {} rounds",
                stats.answers(),
                stats.correct(),
                stats.lapses(),
                stats.rounds(),
            )?;
            writeln!(
                out,
                "next review {} (review count {})",
                done.schedule.next_review_date, done.schedule.review_count
            )?;
        }
    }
    if controller.has_pending_writes() {
        controller.retry_pending_writes().await?;
    }
    Ok(())
}
