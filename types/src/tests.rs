use super::api::*;
use super::*;

#[test]
fn test_broadcast_wire_format() {
    let sync = Broadcast::CallSync {
        started_at: 1_000,
        server_time: 1_500,
    };
    assert_eq!(
        serde_json::to_string(&sync).unwrap(),
        r#"{"type":"call_sync","started_at":1000,"server_time":1500}"#
    );

    let winner = Broadcast::Winner(WinnerNotice {
        winner: "alice".into(),
        player: PlayerId(1),
        index: 7,
        pattern: PatternKind::Row,
        row: Some(2),
        col: None,
        picks: None,
        amount: Money::from_units(16),
    });
    let value: serde_json::Value = serde_json::to_value(&winner).unwrap();
    assert_eq!(value["type"], "winner");
    assert_eq!(value["pattern"], "row");
    assert_eq!(value["row"], 2);
    assert_eq!(value["amount"], "16.00");
    assert_eq!(winner.name(), "winner");

    let restarted: Broadcast = serde_json::from_str(r#"{"type":"restarted","game_id":4}"#).unwrap();
    assert_eq!(restarted, Broadcast::Restarted { game_id: 4 });
}

#[test]
fn test_commands() {
    let ping: Command = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
    assert_eq!(ping, Command::Ping);

    let claim: Command =
        serde_json::from_str(r#"{"action":"claim_bingo","tid":"12","picks":[3,"9","x"]}"#).unwrap();
    match claim {
        Command::ClaimBingo { tid, picks } => {
            assert_eq!(tid.as_int(), Some(12));
            assert_eq!(parse_picks(&picks.unwrap()), vec![3, 9]);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(serde_json::from_str::<Command>(r#"{"action":"shout"}"#).is_err());
    assert_eq!(
        serde_json::to_string(&Reply::Pong).unwrap(),
        r#"{"type":"pong"}"#
    );
}

#[test]
fn test_params() {
    assert_eq!(Param::from(5).as_int(), Some(5));
    assert_eq!(Param::from("10").as_int(), Some(10));
    assert_eq!(Param::from("1e3").as_int(), None);
    assert_eq!(Param::from("").as_int(), None);
    assert_eq!(Param::Int(-1).as_int(), None);

    let req: SelectRequest =
        serde_json::from_str(r#"{"tid":"1","stake":10,"index":"42"}"#).unwrap();
    assert_eq!(req.action, Intent::Preview);
    assert_eq!(req.index.and_then(|p| p.as_int()), Some(42));

    let req: SelectRequest = serde_json::from_str(r#"{"tid":1,"action":"accept"}"#).unwrap();
    assert_eq!(req.action, Intent::Accept);
    assert!(req.stake.is_none());
}

#[test]
fn test_claim_response_shapes() {
    let lost = ClaimResponse::NotBingo {
        ok: false,
        reason: "not_bingo".into(),
        disqualified: true,
    };
    assert_eq!(
        serde_json::to_string(&lost).unwrap(),
        r#"{"ok":false,"reason":"not_bingo","disqualified":true}"#
    );
    let parsed: ClaimResponse = serde_json::from_str(
        r#"{"ok":true,"pattern":"four_corners","index":3,"player":"bob","amount":"8.00"}"#,
    )
    .unwrap();
    assert!(matches!(
        parsed,
        ClaimResponse::Won {
            pattern: PatternKind::FourCorners,
            ..
        }
    ));
}

#[test]
fn test_card_matches_pattern_cells() {
    // The free cell lies on row 2, column 2 and both diagonals
    let card = Card::generate(1);
    for pattern in [
        Pattern::Row(2),
        Pattern::Column(2),
        Pattern::MainDiagonal,
        Pattern::AntiDiagonal,
    ] {
        let free = pattern
            .cells()
            .into_iter()
            .filter(|(r, c)| card.cell(*r, *c) == Cell::Free)
            .count();
        assert_eq!(free, 1, "{pattern:?}");
    }
    assert!(Pattern::FourCorners
        .cells()
        .into_iter()
        .all(|(r, c)| card.cell(r, c) != Cell::Free));
}
