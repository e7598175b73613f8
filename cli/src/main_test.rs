use super::*;
use noughts::net::types::{Board, GameState, Symbol};

fn state() -> GameState {
    let mut board = Board::default();
    board.set(Position::new(1).unwrap(), Mark::X);
    board.set(Position::new(5).unwrap(), Mark::O);
    GameState {
        game_id: "g".to_owned(),
        player1_id: "me".to_owned(),
        player2_id: "you".to_owned(),
        player1_symbol: Symbol::X,
        player2_symbol: Symbol::O,
        current_turn: "me".to_owned(),
        is_finished: false,
        winner: None,
        board,
    }
}

#[test]
fn parse_game_input_accepts_positions_and_commands() {
    assert_eq!(parse_game_input(" 5 "), GameInput::Move(Position::new(5).unwrap()));
    assert_eq!(parse_game_input("r"), GameInput::Restart);
    assert_eq!(parse_game_input("quit"), GameInput::Quit);
    assert_eq!(parse_game_input("0"), GameInput::Unknown);
    assert_eq!(parse_game_input("10"), GameInput::Unknown);
    assert_eq!(parse_game_input("x"), GameInput::Unknown);
}

#[test]
fn render_board_shows_marks_and_free_positions() {
    let rendered = render_board(&GameView::project(&state(), "me"));
    let expected = "You are X\n X | 2 | 3 \n---+---+---\n 4 | O | 6 \n---+---+---\n 7 | 8 | 9 \nYour turn";
    assert_eq!(rendered, expected);
}

#[test]
fn render_board_offers_restart_when_finished() {
    let mut finished = state();
    finished.is_finished = true;
    finished.winner = Some("you".to_owned());
    let rendered = render_board(&GameView::project(&finished, "me"));
    assert!(rendered.ends_with("Winner: you  (r to restart)"));
}

#[test]
fn render_view_before_load() {
    assert_eq!(render_view(&ViewState::Loading), "Loading game...");
}
