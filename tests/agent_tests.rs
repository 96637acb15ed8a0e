use beacon_engine::agent::{Agent, DARK_OPENING, LIGHT_OPENING};
use beacon_engine::board::{GameError, Side};

#[test]
fn first_move_is_the_fixed_opening_placement() {
    let mut light = Agent::new(Side::Light, 2);
    let emitted = light.choose_move().expect("opening");
    assert_eq!(emitted, LIGHT_OPENING);
    assert_eq!(light.board().side_to_move(), Side::Dark);
    assert_eq!(light.board().piece_count(Side::Light), 6);

    let mut dark = Agent::new(Side::Dark, 2);
    dark.notify_opponent_move(&emitted).expect("light opening");
    assert_eq!(dark.choose_move().expect("opening"), DARK_OPENING);
}

#[test]
fn two_agents_stay_in_sync_over_a_short_match() {
    let mut light = Agent::new(Side::Light, 2);
    let mut dark = Agent::new(Side::Dark, 2);

    let opening = light.choose_move().expect("light opening");
    dark.notify_opponent_move(&opening).expect("relay");
    let opening = dark.choose_move().expect("dark opening");
    light.notify_opponent_move(&opening).expect("relay");

    for _ in 0..4 {
        if light.board().is_terminal() {
            break;
        }
        let emitted = light.choose_move().expect("light move");
        dark.notify_opponent_move(&emitted).expect("relay");
        if dark.board().is_terminal() {
            break;
        }
        let emitted = dark.choose_move().expect("dark move");
        light.notify_opponent_move(&emitted).expect("relay");
    }
    assert_eq!(light.board(), dark.board());
}

#[test]
fn legacy_pass_sentinel_parses_but_still_faces_the_oracle() {
    let mut dark = Agent::new(Side::Dark, 2);
    dark.notify_opponent_move(LIGHT_OPENING).expect("opening");
    dark.choose_move().expect("dark opening");

    // Light has step moves available, so a pass is illegal; "PASSE" must
    // have been translated rather than rejected as unparseable.
    assert!(matches!(
        dark.notify_opponent_move("PASSE"),
        Err(GameError::IllegalMove(_))
    ));
    assert!(matches!(
        dark.notify_opponent_move("garbage"),
        Err(GameError::MalformedMove(_))
    ));
}

#[test]
fn opponent_moves_are_validated_before_touching_the_board() {
    let mut dark = Agent::new(Side::Dark, 2);
    dark.notify_opponent_move(LIGHT_OPENING).expect("opening");
    dark.choose_move().expect("dark opening");

    let before = *dark.board();
    // A3 sits on range-2 terrain; one cell is the wrong distance.
    assert!(matches!(
        dark.notify_opponent_move("A3-A4"),
        Err(GameError::IllegalMove(_))
    ));
    assert_eq!(*dark.board(), before);
    // The legal version still goes through.
    dark.notify_opponent_move("A3-A5").expect("legal step");
}
