use anyhow::Result;

use super::Context;
use crate::ui;

pub fn use_board(ctx: &Context, board_id: i64) -> Result<()> {
    ctx.session.remember_board(&board_id.to_string())?;
    ui::print_success(&format!("Board {} selected", board_id));
    ui::print_info("'ob list articles' and 'ob list tasks' now default to this board");
    Ok(())
}

pub fn current(ctx: &Context) -> Result<()> {
    let board = ctx.session.last_board();
    if ctx.json {
        println!("{}", serde_json::json!({ "board": board }));
        return Ok(());
    }
    match board {
        Some(id) => println!("{}", id),
        None => ui::print_warning("No board selected. Run 'ob board use <id>'."),
    }
    Ok(())
}
