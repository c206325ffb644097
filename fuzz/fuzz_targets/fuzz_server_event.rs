#![no_main]

use goban_sync::game::{self, GameAction, GameState};
use goban_sync::protocol::ServerEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        let _ = serde_json::from_slice::<ServerEvent>(data);
        return;
    };

    // Whatever decodes must fold into game state without panicking.
    if let Ok(ServerEvent::GameUpdate(snapshot)) = ServerEvent::from_json(text) {
        let loaded = game::reduce(&GameState::default(), GameAction::LoadMatch(snapshot.clone()));
        let updated = game::reduce(&loaded, GameAction::UpdateGame(snapshot));
        let _ = game::reduce(&updated, GameAction::Tick);
    }
});
