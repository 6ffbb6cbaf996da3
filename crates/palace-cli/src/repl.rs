//! REPL – the interactive palace shell.
//!
//! Supported slash-commands:
//!   /help                      – show this list
//!   /new [template] <name…>    – create a palace (edit mode)
//!   /templates                 – list room templates
//!   /palaces                   – list saved palaces
//!   /load <id|#>               – open a saved palace (explore mode)
//!   /delete <id|#>             – delete a saved palace
//!   /save                      – save the current palace
//!   /export                    – write the current palace to a JSON file
//!   /import <path>             – import a palace JSON file
//!   /rooms, /room <id|#>       – list / switch rooms
//!   /mode <explore|edit>       – change interaction mode
//!   /palette                   – list placeable object types
//!   /place <type>, /cancel     – start / stop placing an object
//!   /drop <x> <y> <z>          – place the pending object
//!   /objects                   – list objects in the room
//!   /select <id|#>, /deselect  – change the selection
//!   /title, /note, /color, /scale, /strength, /remove – edit the selection
//!   /quiz, /pick <id|#>, /close – take a quiz
//!   /stats, /status            – quiz statistics / current state
//!   /quit | /exit              – leave the shell
//!
//! Input is read asynchronously and raced against the quiz verdict timer and
//! Ctrl-C, so the quiz advances on its own while the prompt waits.

use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::debug;

use palace_store::{
    Advance, PalaceStore, QuestionPhase, QuizFlow, QuizProgress, QuizStats, StoreEvent, Verdict,
};
use palace_types::{Mode, ObjectPatch, QuizSession, RoomTemplateId, Vec3, catalog};

use crate::config::Config;

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Entry point for the interactive REPL.
pub async fn run(store: PalaceStore, cfg: Config) {
    let mut events = store.subscribe();
    let mut shell = Shell::new(store, cfg);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        shell.print_prompt();
        let deadline = shell.flow.deadline();

        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if shell.dispatch(line.trim()) == Control::Quit {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    eprintln!("{}: {}", "Read error".red(), e);
                    break;
                }
            },
            () = wait_until(deadline) => {
                println!();
                shell.on_result_timeout();
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "⚠  Ctrl-C received – exiting.".yellow().bold());
                shell.flow.cancel();
                break;
            }
        }

        drain_events(&mut events);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

fn drain_events(events: &mut broadcast::Receiver<StoreEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => debug!(?event, "store event"),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "store events dropped");
            }
            Err(_) => break,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell
// ─────────────────────────────────────────────────────────────────────────────

/// Store, quiz pacing and settings for one interactive session.
pub struct Shell {
    store: PalaceStore,
    flow: QuizFlow,
    cfg: Config,
}

impl Shell {
    pub fn new(store: PalaceStore, cfg: Config) -> Self {
        let flow = QuizFlow::new(Duration::from_millis(cfg.result_delay_ms));
        Self { store, flow, cfg }
    }

    fn print_prompt(&self) {
        let prompt = match self.store.current_palace() {
            Some(_) => format!("palace[{}]>", self.store.mode()),
            None => "palace>".to_string(),
        };
        print!("{} ", prompt.bold().cyan());
        io::stdout().flush().ok();
    }

    /// Run one command line.
    pub fn dispatch(&mut self, line: &str) -> Control {
        if line.is_empty() {
            return Control::Continue;
        }
        let (cmd, rest) = split_command(line);

        match cmd {
            "/help" => cmd_help(),
            "/new" => self.cmd_new(rest),
            "/templates" => self.cmd_templates(),
            "/palaces" => self.cmd_palaces(),
            "/load" => self.cmd_load(rest),
            "/delete" => self.cmd_delete(rest),
            "/save" => self.cmd_save(),
            "/export" => self.cmd_export(),
            "/import" => self.cmd_import(rest),
            "/rooms" => self.cmd_rooms(),
            "/room" => self.cmd_room(rest),
            "/mode" => self.cmd_mode(rest),
            "/palette" => cmd_palette(),
            "/place" => self.cmd_place(rest),
            "/cancel" => self.cmd_cancel(),
            "/drop" => self.cmd_drop(rest),
            "/objects" => self.cmd_objects(),
            "/select" => self.cmd_select(rest),
            "/deselect" => self.cmd_deselect(),
            "/title" => self.cmd_title(rest),
            "/note" => self.edit_selected(ObjectPatch::new().note(rest)),
            "/color" => self.cmd_color(rest),
            "/scale" => self.cmd_scale(rest),
            "/strength" => self.cmd_strength(rest),
            "/remove" => self.cmd_remove(),
            "/quiz" => self.cmd_quiz(),
            "/pick" => self.cmd_pick(rest),
            "/close" => self.cmd_close(),
            "/stats" => self.cmd_stats(),
            "/status" => self.cmd_status(),
            "/quit" | "/exit" => {
                println!("{}", "Goodbye.".green());
                return Control::Quit;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }

        self.flow.sync(&self.store);
        Control::Continue
    }

    /// Called when the verdict timer fires.
    fn on_result_timeout(&mut self) {
        match self.flow.advance_due(&mut self.store, Instant::now()) {
            Advance::Next { .. } => self.print_question(),
            Advance::Completed(session) => print_summary(&session),
            Advance::Idle => {}
        }
    }

    // ── palaces ──────────────────────────────────────────────────────────────

    fn cmd_new(&mut self, rest: &str) {
        let mut words = rest.split_whitespace();
        let Some(first) = words.next() else {
            println!("Usage: {}", "/new [template] <name…>".bold());
            return;
        };
        let (template, name) = if RoomTemplateId::parse(first).is_some() {
            (first.to_string(), words.collect::<Vec<_>>().join(" "))
        } else {
            (self.cfg.default_template.clone(), rest.to_string())
        };
        if name.is_empty() {
            println!("Usage: {}", "/new [template] <name…>".bold());
            return;
        }

        self.flow.cancel();
        self.store.create_palace(&name, &template);
        let room = self
            .store
            .current_room()
            .map(|r| r.name.clone())
            .unwrap_or_default();
        println!(
            "{} Created {} with the {}.  You are in {} mode.",
            "✓".green().bold(),
            name.bold(),
            room.yellow(),
            "edit".cyan()
        );
    }

    fn cmd_templates(&self) {
        println!("{}", "Room Templates".bold().underline());
        for t in &catalog::ROOM_TEMPLATES {
            let marker = if t.id.as_str() == self.cfg.default_template { "▶" } else { " " };
            println!(
                "  {} {:<16} {} – {}",
                marker.green(),
                t.id.as_str().bold().cyan(),
                t.name,
                t.description.dimmed()
            );
        }
    }

    fn cmd_palaces(&self) {
        let saved = self.store.saved_palaces();
        if saved.is_empty() {
            println!("  No saved palaces.  Create one with {}.", "/new".bold());
            return;
        }
        let current = self.store.current_palace().map(|p| p.id.as_str());
        println!("{}", "Saved Palaces".bold().underline());
        for (i, p) in saved.iter().enumerate() {
            let marker = if Some(p.id.as_str()) == current { "▶" } else { " " };
            println!(
                "  {} #{:<3} {}  {} room(s), {} object(s), modified {}",
                marker.green(),
                i + 1,
                p.name.bold(),
                p.room_count,
                p.object_count,
                p.last_modified.format("%Y-%m-%d %H:%M").to_string().dimmed()
            );
        }
    }

    fn saved_ids(&self) -> Vec<String> {
        self.store.saved_palaces().into_iter().map(|p| p.id).collect()
    }

    fn cmd_load(&mut self, rest: &str) {
        let Some(id) = resolve(rest, &self.saved_ids()) else {
            println!("{} '{}'. See {}.", "No saved palace".red(), rest.yellow(), "/palaces".bold());
            return;
        };
        let Some(palace) = self.store.find_saved_palace(&id) else {
            println!("{} '{}'.", "No saved palace".red(), id.yellow());
            return;
        };
        let name = palace.name.clone();
        self.flow.cancel();
        self.store.load_palace(palace);
        if self.store.current_palace().map(|p| p.id.as_str()) == Some(id.as_str()) {
            println!("{} Loaded {}.", "✓".green().bold(), name.bold());
        } else {
            println!("{} '{}' has no rooms and cannot be opened.", "Palace".red(), name);
        }
    }

    fn cmd_delete(&mut self, rest: &str) {
        let Some(id) = resolve(rest, &self.saved_ids()) else {
            println!("{} '{}'. See {}.", "No saved palace".red(), rest.yellow(), "/palaces".bold());
            return;
        };
        if self.store.delete_palace(&id) {
            println!("{} Deleted {}.", "✓".green().bold(), id.dimmed());
            if self.store.current_palace().map(|p| p.id.as_str()) == Some(id.as_str()) {
                println!("  The palace is still open; {} would store it again.", "/save".bold());
            }
        } else {
            println!("  Nothing deleted.");
        }
    }

    fn cmd_save(&mut self) {
        let Some(name) = self.store.current_palace().map(|p| p.name.clone()) else {
            println!("{}", "No palace open.".yellow());
            return;
        };
        self.store.save_palace();
        println!("{} Saved {}.", "✓".green().bold(), name.bold());
    }

    fn cmd_export(&self) {
        let (Some(json), Some(file_name)) =
            (self.store.export_palace(), self.store.export_file_name())
        else {
            println!("{}", "No palace open.".yellow());
            return;
        };
        let path = self.cfg.export_dir.join(file_name.replace(['/', '\\'], "_"));
        match write_export(&path, &json) {
            Ok(()) => println!(
                "{} Exported to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => println!("{}: {}", "Export failed".red(), e),
        }
    }

    fn cmd_import(&mut self, rest: &str) {
        if rest.is_empty() {
            println!("Usage: {}", "/import <path>".bold());
            return;
        }
        let data = match std::fs::read_to_string(rest) {
            Ok(data) => data,
            Err(e) => {
                println!("{} {}: {}", "Cannot read".red(), rest.yellow(), e);
                return;
            }
        };
        self.flow.cancel();
        match self.store.import_palace(&data) {
            Ok(_) => {
                let name = self
                    .store
                    .current_palace()
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                println!("{} Imported {}.", "✓".green().bold(), name.bold());
            }
            Err(e) => println!("{}: {}", "Import failed".red(), e),
        }
    }

    // ── rooms & mode ─────────────────────────────────────────────────────────

    fn cmd_rooms(&self) {
        let Some(palace) = self.store.current_palace() else {
            println!("{}", "No palace open.".yellow());
            return;
        };
        println!("{}", format!("Rooms of {}", palace.name).bold().underline());
        for (i, room) in palace.rooms.iter().enumerate() {
            let marker = if room.id == palace.current_room { "▶" } else { " " };
            println!(
                "  {} #{:<3} {} ({}), {} object(s)",
                marker.green(),
                i + 1,
                room.name.bold(),
                room.template.as_str().dimmed(),
                room.objects.len()
            );
        }
    }

    fn cmd_room(&mut self, rest: &str) {
        if self.store.mode() == Mode::Quiz {
            println!("{}", "Rooms cannot be switched during a quiz.".yellow());
            return;
        }
        let ids: Vec<String> = self
            .store
            .current_palace()
            .map(|p| p.rooms.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default();
        let Some(id) = resolve(rest, &ids) else {
            println!("{} '{}'. See {}.", "No such room".red(), rest.yellow(), "/rooms".bold());
            return;
        };
        self.store.switch_room(&id);
        if let Some(room) = self.store.current_room() {
            println!("{} Entered {}.", "✓".green().bold(), room.name.bold());
        }
    }

    fn cmd_mode(&mut self, rest: &str) {
        let mode = match rest.parse::<Mode>() {
            Ok(Mode::Quiz) => {
                println!("Use {} to start a quiz.", "/quiz".bold());
                return;
            }
            Ok(mode) => mode,
            Err(e) => {
                println!("{}: {}", "Error".red(), e);
                return;
            }
        };
        if self.store.mode() == Mode::Quiz {
            self.flow.cancel();
        }
        self.store.set_mode(mode);
        println!("{} Now in {} mode.", "✓".green().bold(), mode.to_string().cyan());
    }

    // ── placing ──────────────────────────────────────────────────────────────

    fn cmd_place(&mut self, rest: &str) {
        if self.store.current_room().is_none() {
            println!("{}", "No palace open.".yellow());
            return;
        }
        if self.store.mode() != Mode::Edit {
            println!("Switch to edit mode first: {}", "/mode edit".bold());
            return;
        }
        let Some(object_type) = catalog::find_object_type(rest) else {
            println!("{} '{}'. See {}.", "Unknown object type".red(), rest.yellow(), "/palette".bold());
            return;
        };
        self.store.set_placing(true, Some(object_type.id));
        println!(
            "  Placing a {}.  Drop it with {} or {}.",
            object_type.name.bold(),
            "/drop <x> <y> <z>".bold(),
            "/cancel".bold()
        );
    }

    fn cmd_cancel(&mut self) {
        if self.store.is_placing() {
            self.store.set_placing(false, None);
            println!("  Placement cancelled.");
        }
    }

    fn cmd_drop(&mut self, rest: &str) {
        let Some(object_type) = self.store.placing_object_type().map(str::to_string) else {
            println!("Nothing to place.  Use {} first.", "/place <type>".bold());
            return;
        };
        let Some(position) = parse_vec3(rest) else {
            println!("Usage: {}", "/drop <x> <y> <z>".bold());
            return;
        };
        if self.store.add_object(&object_type, position).is_some()
            && let Some(object) = self.store.selected_object()
        {
            println!(
                "{} Placed {} at {}.",
                "✓".green().bold(),
                object.title.bold(),
                format_vec3(&object.position)
            );
        }
    }

    // ── objects ──────────────────────────────────────────────────────────────

    fn room_object_ids(&self) -> Vec<String> {
        self.store
            .current_room()
            .map(|r| r.objects.iter().map(|o| o.id.clone()).collect())
            .unwrap_or_default()
    }

    fn cmd_objects(&self) {
        let Some(room) = self.store.current_room() else {
            println!("{}", "No palace open.".yellow());
            return;
        };
        if room.objects.is_empty() {
            println!("  {} is empty.", room.name);
            return;
        }
        let quizzing = self.store.mode() == Mode::Quiz;
        let selected = self.store.selected_object().map(|o| o.id.as_str());
        println!("{}", format!("Objects in {}", room.name).bold().underline());
        for (i, object) in room.objects.iter().enumerate() {
            let marker = if Some(object.id.as_str()) == selected { "▶" } else { " " };
            if quizzing {
                // Titles would give the answers away.
                println!(
                    "  {} #{:<3} {:<10} at {}",
                    marker.green(),
                    i + 1,
                    object.object_type,
                    format_vec3(&object.position)
                );
            } else {
                println!(
                    "  {} #{:<3} {} [{}] strength {}/5",
                    marker.green(),
                    i + 1,
                    object.title.bold(),
                    object.object_type.dimmed(),
                    object.memory_strength
                );
            }
        }
    }

    fn cmd_select(&mut self, rest: &str) {
        if self.store.mode() == Mode::Quiz {
            self.cmd_pick(rest);
            return;
        }
        let Some(id) = resolve(rest, &self.room_object_ids()) else {
            println!("{} '{}'. See {}.", "No such object".red(), rest.yellow(), "/objects".bold());
            return;
        };
        self.store.select_object(Some(&id));
        self.print_selection();
    }

    fn cmd_deselect(&mut self) {
        self.store.select_object(None);
    }

    fn print_selection(&self) {
        let Some(object) = self.store.selected_object() else {
            return;
        };
        println!("  {} {}", object.title.bold(), format!("[{}]", object.object_type).dimmed());
        if !object.note.is_empty() {
            println!("    {}", object.note);
        }
        println!(
            "    at {}  scale {}  colour {}  strength {}/5",
            format_vec3(&object.position),
            format_vec3(&object.scale),
            object.color,
            object.memory_strength
        );
    }

    fn edit_selected(&mut self, patch: ObjectPatch) {
        if self.store.mode() == Mode::Quiz {
            println!("{}", "Objects cannot be edited during a quiz.".yellow());
            return;
        }
        let Some(id) = self.store.selected_object().map(|o| o.id.clone()) else {
            println!("Nothing selected.  Use {} first.", "/select <id|#>".bold());
            return;
        };
        if self.store.update_object(&id, &patch) {
            self.print_selection();
        }
    }

    fn cmd_title(&mut self, rest: &str) {
        if rest.is_empty() {
            println!("Usage: {}", "/title <text…>".bold());
            return;
        }
        self.edit_selected(ObjectPatch::new().title(rest));
    }

    fn cmd_color(&mut self, rest: &str) {
        if !is_hex_color(rest) {
            println!("Usage: {} (e.g. #FFD700)", "/color <hex>".bold());
            return;
        }
        self.edit_selected(ObjectPatch::new().color(rest.to_uppercase()));
    }

    fn cmd_scale(&mut self, rest: &str) {
        match rest.parse::<f64>() {
            Ok(f) if f.is_finite() && f > 0.0 => self.edit_selected(ObjectPatch::new().scale([f, f, f])),
            _ => println!("Usage: {} (a positive number)", "/scale <f>".bold()),
        }
    }

    fn cmd_strength(&mut self, rest: &str) {
        match rest.parse::<i32>() {
            Ok(n) if (0..=5).contains(&n) => self.edit_selected(
                ObjectPatch::new()
                    .memory_strength(n)
                    .last_reviewed(Utc::now()),
            ),
            _ => println!("Usage: {} (0 to 5)", "/strength <n>".bold()),
        }
    }

    fn cmd_remove(&mut self) {
        if self.store.mode() == Mode::Quiz {
            println!("{}", "Objects cannot be removed during a quiz.".yellow());
            return;
        }
        let Some((id, title)) = self
            .store
            .selected_object()
            .map(|o| (o.id.clone(), o.title.clone()))
        else {
            println!("Nothing selected.  Use {} first.", "/select <id|#>".bold());
            return;
        };
        self.store.delete_object(&id);
        println!("{} Removed {}.", "✓".green().bold(), title.bold());
    }

    // ── quiz ─────────────────────────────────────────────────────────────────

    fn cmd_quiz(&mut self) {
        if self.store.current_room().is_none() {
            println!("{}", "No palace open.".yellow());
            return;
        }
        if !self.flow.start(&mut self.store) {
            println!("{}", "This room has no objects to quiz on.".yellow());
            return;
        }
        println!("{}", "Memory Quiz".bold().underline());
        println!(
            "  Find each object by its title with {}.  {} to stop.",
            "/pick <id|#>".bold(),
            "/close".bold()
        );
        self.print_question();
    }

    fn cmd_pick(&mut self, rest: &str) {
        match self.flow.phase() {
            QuestionPhase::Idle => {
                println!("No quiz running.  Start one with {}.", "/quiz".bold());
                return;
            }
            QuestionPhase::ShowingResult(_) => {
                println!("{}", "Wait for the next question.".dimmed());
                return;
            }
            QuestionPhase::AwaitingSelection => {}
        }
        let Some(id) = resolve(rest, &self.room_object_ids()) else {
            println!("{} '{}'. See {}.", "No such object".red(), rest.yellow(), "/objects".bold());
            return;
        };
        if self.store.quiz_target().is_none() {
            match self.flow.skip_dangling(&mut self.store) {
                Advance::Next { .. } => {}
                Advance::Completed(session) => {
                    println!("{}", "No answerable questions left.".yellow());
                    print_summary(&session);
                    return;
                }
                Advance::Idle => return,
            }
        }
        if let Some(verdict) = self.flow.on_selection(&mut self.store, &id, Instant::now()) {
            print_verdict(&verdict);
            println!(
                "  {}",
                format!("Next in {:.1}s…", self.flow.delay().as_secs_f64()).dimmed()
            );
        }
    }

    fn cmd_close(&mut self) {
        if self.store.mode() != Mode::Quiz {
            println!("No quiz running.");
            return;
        }
        self.flow.close(&mut self.store);
        println!("  Quiz closed.  This attempt was not recorded.");
    }

    fn print_question(&self) {
        let Some(progress) = QuizProgress::from_store(&self.store, Utc::now()) else {
            return;
        };
        println!();
        println!(
            "  Question {} of {}   ⏱ {}   ★ {}/{}",
            progress.number,
            progress.total,
            progress.elapsed(),
            progress.score,
            progress.total
        );
        println!("  {}", progress_bar(progress.percent, 30).blue());
        println!("  Find the object:");
        if let Some(title) = &progress.title {
            println!("    {}", title.bold());
        }
        if let Some(note) = &progress.note {
            println!("    {}", note.dimmed());
        }
    }

    // ── info ─────────────────────────────────────────────────────────────────

    fn cmd_stats(&self) {
        let results = self.store.quiz_results();
        println!("{}", "Quiz Statistics".bold().underline());
        print_stats("All palaces", &QuizStats::from_results(&results));
        if let Some(palace) = self.store.current_palace() {
            print_stats(&palace.name, &QuizStats::for_palace(&results, &palace.id));
        }
    }

    fn cmd_status(&self) {
        let Some(palace) = self.store.current_palace() else {
            println!("  No palace open.  {} or {}.", "/new".bold(), "/palaces".bold());
            return;
        };
        println!("  Palace : {}", palace.name.bold());
        if let Some(room) = self.store.current_room() {
            println!("  Room   : {} ({} object(s))", room.name, room.objects.len());
        }
        println!("  Mode   : {}", self.store.mode().to_string().cyan());
        if let Some(object) = self.store.selected_object() {
            println!("  Select : {}", object.title);
        }
        if let Some(object_type) = self.store.placing_object_type() {
            println!("  Placing: {}", object_type);
        }
        if let Some(progress) = QuizProgress::from_store(&self.store, Utc::now()) {
            println!(
                "  Quiz   : question {} of {}, {} correct, {} mistake(s), {}",
                progress.number,
                progress.total,
                progress.score,
                progress.mistakes,
                progress.elapsed()
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stateless output
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Palace Commands".bold().underline());
    let rows = [
        ("/new [template] <name…>", "create a palace"),
        ("/templates", "list room templates"),
        ("/palaces", "list saved palaces"),
        ("/load <id|#>", "open a saved palace"),
        ("/delete <id|#>", "delete a saved palace"),
        ("/save", "save the open palace"),
        ("/export", "write the open palace to JSON"),
        ("/import <path>", "import a palace from JSON"),
        ("/rooms  /room <id|#>", "list or enter rooms"),
        ("/mode <explore|edit>", "change mode"),
        ("/palette", "list object types"),
        ("/place <type>  /cancel", "start or stop placing"),
        ("/drop <x> <y> <z>", "place the pending object"),
        ("/objects", "list objects in this room"),
        ("/select <id|#>  /deselect", "change the selection"),
        ("/title /note /color /scale", "edit the selection"),
        ("/strength <0-5>  /remove", "rate or remove the selection"),
        ("/quiz  /pick <id|#>  /close", "take a quiz"),
        ("/stats  /status", "show statistics or state"),
        ("/quit  /exit", "leave"),
    ];
    for (cmd, what) in rows {
        println!("  {:<30} – {}", cmd.bold().cyan(), what);
    }
    println!();
}

fn cmd_palette() {
    println!("{}", "Object Palette".bold().underline());
    for category in catalog::categories() {
        println!("  {}", category.bold());
        for t in catalog::object_types_in(category) {
            println!("    {:<12} {} – {}", t.id.cyan(), t.name, t.description.dimmed());
        }
    }
}

fn print_verdict(verdict: &Verdict) {
    if verdict.correct {
        println!("  {} {}", "✓".green().bold(), "Correct!".green().bold());
    } else {
        println!("  {} {}", "✗".red().bold(), "Incorrect".red().bold());
        if let Some(title) = &verdict.expected_title {
            println!("    You were looking for: {}", title.bold());
        }
    }
}

fn print_summary(session: &QuizSession) {
    let secs = session
        .end_time
        .map(|end| (end - session.start_time).num_seconds())
        .unwrap_or(0);
    println!("{}", "Quiz complete!".bold().green());
    println!(
        "  Score {}/{}, {} mistake(s), time {}",
        session.score.to_string().bold(),
        session.len(),
        session.mistakes,
        palace_store::format_elapsed(secs)
    );
}

fn print_stats(label: &str, stats: &QuizStats) {
    if stats.sessions == 0 {
        println!("  {}: no quizzes yet", label.bold());
        return;
    }
    println!(
        "  {}: {} quiz(zes), {} correct, {} mistake(s), {:.0}% accuracy, best score {}",
        label.bold(),
        stats.sessions,
        stats.total_correct,
        stats.total_mistakes,
        stats.accuracy,
        stats.best_score
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Split `"/cmd rest of line"` into the command and its trimmed argument.
fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    }
}

/// Resolve `arg` as a 1-based `#n` / `n` list index or as a literal id.
fn resolve(arg: &str, ids: &[String]) -> Option<String> {
    let arg = arg.trim();
    if arg.is_empty() {
        return None;
    }
    if let Ok(n) = arg.trim_start_matches('#').parse::<usize>() {
        return n.checked_sub(1).and_then(|i| ids.get(i)).cloned();
    }
    ids.iter().find(|id| id.as_str() == arg).cloned()
}

fn parse_vec3(rest: &str) -> Option<Vec3> {
    let parts: Vec<f64> = rest
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y, z] if parts.iter().all(|v| v.is_finite()) => Some([*x, *y, *z]),
        _ => None,
    }
}

fn format_vec3(v: &Vec3) -> String {
    format!("({:.1}, {:.1}, {:.1})", v[0], v[1], v[2])
}

fn is_hex_color(s: &str) -> bool {
    s.strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

fn write_export(path: &Path, json: &str) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use palace_storage::PalaceRepository;

    fn make_shell(export_dir: &Path) -> Shell {
        let store = PalaceStore::with_seed(PalaceRepository::in_memory(), 3);
        let cfg = Config {
            data_path: export_dir.join("unused.db"),
            result_delay_ms: 2000,
            default_template: "zen-garden".to_string(),
            export_dir: export_dir.to_path_buf(),
        };
        Shell::new(store, cfg)
    }

    fn run_all(shell: &mut Shell, lines: &[&str]) {
        for line in lines {
            assert_eq!(shell.dispatch(line), Control::Continue, "{line}");
        }
    }

    #[test]
    fn split_command_separates_arguments() {
        assert_eq!(split_command("/new zen-garden My  Palace"), ("/new", "zen-garden My  Palace"));
        assert_eq!(split_command("/save"), ("/save", ""));
    }

    #[test]
    fn resolve_accepts_index_or_id() {
        let ids = vec!["obj-a".to_string(), "obj-b".to_string()];
        assert_eq!(resolve("#2", &ids).as_deref(), Some("obj-b"));
        assert_eq!(resolve("1", &ids).as_deref(), Some("obj-a"));
        assert_eq!(resolve("obj-b", &ids).as_deref(), Some("obj-b"));
        assert_eq!(resolve("#0", &ids), None);
        assert_eq!(resolve("#3", &ids), None);
        assert_eq!(resolve("obj-c", &ids), None);
        assert_eq!(resolve("", &ids), None);
    }

    #[test]
    fn parse_vec3_requires_three_numbers() {
        assert_eq!(parse_vec3("1 2.5 -3"), Some([1.0, 2.5, -3.0]));
        assert_eq!(parse_vec3("1 2"), None);
        assert_eq!(parse_vec3("1 2 x"), None);
        assert_eq!(parse_vec3("1 2 NaN"), None);
    }

    #[test]
    fn hex_colors_are_validated() {
        assert!(is_hex_color("#FFD700"));
        assert!(is_hex_color("#abc"));
        assert!(!is_hex_color("FFD700"));
        assert!(!is_hex_color("#GGGGGG"));
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(50.0, 4), "[██░░]");
        assert_eq!(progress_bar(100.0, 4), "[████]");
        assert_eq!(progress_bar(150.0, 2), "[██]");
    }

    #[test]
    fn new_uses_named_or_default_template() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(&mut shell, &["/new medieval-castle Kings of England"]);
        let palace = shell.store.current_palace().unwrap();
        assert_eq!(palace.name, "Kings of England");
        assert_eq!(palace.rooms[0].template, RoomTemplateId::MedievalCastle);

        run_all(&mut shell, &["/new Shopping List"]);
        let palace = shell.store.current_palace().unwrap();
        assert_eq!(palace.name, "Shopping List");
        assert_eq!(palace.rooms[0].template, RoomTemplateId::ZenGarden);
        assert_eq!(shell.store.saved_palaces().len(), 2);
    }

    #[test]
    fn place_and_edit_an_object() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(
            &mut shell,
            &[
                "/new Garden",
                "/place crown",
                "/drop 1 0.5 -2",
                "/title William I",
                "/note 1066",
                "/color #ffd700",
                "/strength 4",
            ],
        );
        let object = shell.store.selected_object().unwrap();
        assert_eq!(object.object_type, "crown");
        assert_eq!(object.position, [1.0, 0.5, -2.0]);
        assert_eq!(object.title, "William I");
        assert_eq!(object.note, "1066");
        assert_eq!(object.color, "#FFD700");
        assert_eq!(object.memory_strength, 4);
        assert!(object.last_reviewed.is_some());
        assert!(!shell.store.is_placing());
    }

    #[test]
    fn placing_requires_edit_mode() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(&mut shell, &["/new Garden", "/mode explore", "/place gem"]);
        assert!(!shell.store.is_placing());
        run_all(&mut shell, &["/mode edit", "/place dragon"]);
        assert!(!shell.store.is_placing());
    }

    #[test]
    fn remove_clears_selection() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(&mut shell, &["/new Garden", "/place key", "/drop 0 0 0", "/remove"]);
        assert!(shell.store.selected_object().is_none());
        assert!(shell.store.current_room().unwrap().objects.is_empty());
    }

    #[test]
    fn quiz_pick_scores_the_answer() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(
            &mut shell,
            &["/new Garden", "/place gem", "/drop 0 0 0", "/place key", "/drop 1 0 0", "/quiz"],
        );
        assert_eq!(shell.store.mode(), Mode::Quiz);
        let target = shell.store.quiz_session().unwrap().current_object_id().unwrap().to_string();
        let index = shell.room_object_ids().iter().position(|id| *id == target).unwrap() + 1;

        run_all(&mut shell, &[format!("/pick #{index}").as_str()]);
        assert_eq!(shell.store.quiz_session().unwrap().score, 1);
        assert!(matches!(shell.flow.phase(), QuestionPhase::ShowingResult(_)));

        // A second pick while the verdict is showing is ignored.
        run_all(&mut shell, &["/pick #1"]);
        let session = shell.store.quiz_session().unwrap();
        assert_eq!(session.score + session.mistakes, 1);
    }

    #[test]
    fn room_switch_is_refused_during_a_quiz() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(&mut shell, &["/new Garden", "/place gem", "/drop 0 0 0"]);
        let mut palace = shell.store.current_palace().unwrap().clone();
        let first_room = palace.current_room.clone();
        palace
            .rooms
            .push(palace_types::Room::from_template(catalog::room_template("modern-office")));
        shell.store.load_palace(palace);

        run_all(&mut shell, &["/quiz", "/room #2"]);
        assert_eq!(shell.store.mode(), Mode::Quiz);
        assert_eq!(shell.store.current_room().unwrap().id, first_room);
        assert!(shell.store.quiz_target().is_some());

        run_all(&mut shell, &["/close", "/room #2"]);
        assert_ne!(shell.store.current_room().unwrap().id, first_room);
    }

    #[test]
    fn close_abandons_the_quiz() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(&mut shell, &["/new Garden", "/place gem", "/drop 0 0 0", "/quiz", "/pick #1", "/close"]);
        assert_eq!(shell.store.mode(), Mode::Explore);
        assert!(shell.flow.deadline().is_none());
        assert!(shell.store.quiz_results().is_empty());
    }

    #[test]
    fn export_then_import_creates_a_copy() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(&mut shell, &["/new Travel Plans", "/place book", "/drop 0 1 0", "/save", "/export"]);
        let exported = dir.path().join("Travel Plans.json");
        assert!(exported.exists());
        let original = shell.store.current_palace().unwrap().id.clone();

        run_all(&mut shell, &[format!("/import {}", exported.display()).as_str()]);
        let imported = shell.store.current_palace().unwrap();
        assert_ne!(imported.id, original);
        assert_eq!(imported.name, "Travel Plans");
        assert_eq!(shell.store.saved_palaces().len(), 2);
    }

    #[test]
    fn load_and_delete_by_index() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        run_all(&mut shell, &["/new First", "/new Second", "/load #1"]);
        assert_eq!(shell.store.current_palace().unwrap().name, "First");
        assert_eq!(shell.store.mode(), Mode::Explore);

        run_all(&mut shell, &["/delete #2"]);
        let saved = shell.store.saved_palaces();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "First");
    }

    #[test]
    fn unknown_command_keeps_running_and_quit_stops() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut shell = make_shell(dir.path());
        assert_eq!(shell.dispatch("/fly"), Control::Continue);
        assert_eq!(shell.dispatch(""), Control::Continue);
        assert_eq!(shell.dispatch("/quit"), Control::Quit);
    }
}
