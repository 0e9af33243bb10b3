//! Match State Machine
//!
//! One [`MatchEngine`] per match. It is driven by two kinds of calls:
//!
//! - [`MatchEngine::on_timer`] when the wake it asked for comes due
//! - player commands (mode select, key edges, leaving)
//!
//! Every call takes the current wall-clock time in milliseconds. Instead of
//! ticking at a fixed rate, each update returns a [`Wake`] telling the caller
//! when something next needs to happen: a phase deadline, or the moment the
//! ball is predicted to reach a wall or paddle plane.
//!
//! The engine never talks to sockets or storage. Events are queued in an
//! outbox and drained with [`MatchEngine::take_events`].

use tracing::{debug, info};

use crate::core::physics::{self, PlaneHit};
use crate::core::rng::DeterministicRng;
use crate::game::config::{ConfigError, GameMode, MatchConfig, MatchType};
use crate::game::events::{MatchEvent, Snapshot};
use crate::game::input::{apply_paddle_travel, Direction};
use crate::game::rating::RatingUpdate;
use crate::game::state::{MatchId, MatchPhase, MatchState, PlayerId, PlayerInfo, Seat};
use crate::{COUNTDOWN_MS, FINISH_LINGER_MS, MODE_SELECT_MS, PHASE_STEP_MS};

/// Ball and paddle speed growth per paddle hit in [`GameMode::Speed`].
pub const SPEED_RATCHET: f64 = 1.08;

/// Serve |vy| / |vx| bound, roughly tan(22.7°).
pub const SERVE_CONE: f64 = 0.42;

/// When the engine next needs to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Run again after this many milliseconds.
    After(u64),
    /// Match is over, no further updates.
    Stop,
}

impl Wake {
    /// Delay in milliseconds, `None` once stopped.
    pub fn delay_ms(self) -> Option<u64> {
        match self {
            Wake::After(ms) => Some(ms),
            Wake::Stop => None,
        }
    }
}

/// Errors raised while setting up a match.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Configuration rejected.
    #[error("invalid match config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Same player in both seats.
    #[error("player {0} cannot play against themselves")]
    SamePlayer(String),
}

/// Standings and ratings once a match is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// Ranked / casual / private.
    pub match_type: MatchType,
    /// Winning player.
    pub winner: PlayerId,
    /// Losing player.
    pub loser: PlayerId,
    /// Winner's final score.
    pub winner_score: i32,
    /// Loser's final score, `-1` on forfeit.
    pub loser_score: i32,
    /// Post-match ratings (unchanged for unrated matches).
    pub ratings: RatingUpdate,
}

/// Authoritative state machine for one match.
pub struct MatchEngine {
    id: MatchId,
    config: MatchConfig,
    players: [PlayerInfo; 2],
    match_type: MatchType,
    mode: GameMode,
    state: MatchState,
    rng: DeterministicRng,
    events: Vec<MatchEvent>,
}

impl MatchEngine {
    /// Seat two players and open mode select at `now`.
    ///
    /// Queues the `matched` announcement.
    pub fn new(
        id: MatchId,
        config: MatchConfig,
        players: [PlayerInfo; 2],
        match_type: MatchType,
        seed: u64,
        now: u64,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if players[0].id == players[1].id {
            return Err(EngineError::SamePlayer(players[0].id.to_uuid_string()));
        }

        let mut state = MatchState::new(&config, now);
        state.round_deadline = now + MODE_SELECT_MS;

        let mut engine = Self {
            id,
            config,
            players,
            match_type,
            mode: GameMode::default(),
            state,
            rng: DeterministicRng::new(seed),
            events: Vec::new(),
        };
        engine.push(MatchEvent::matched(players[0].id, players[1].id));
        Ok(engine)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Match identifier.
    pub fn id(&self) -> &MatchId {
        &self.id
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    /// Selected game mode.
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Match type.
    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    /// Seated players.
    pub fn players(&self) -> &[PlayerInfo; 2] {
        &self.players
    }

    /// Read-only view of the state.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Configuration.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Which seat a player occupies.
    pub fn seat_of(&self, player: &PlayerId) -> Option<Seat> {
        if self.players[0].id == *player {
            Some(Seat::One)
        } else if self.players[1].id == *player {
            Some(Seat::Two)
        } else {
            None
        }
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    fn push(&mut self, event: MatchEvent) {
        self.events.push(event);
    }

    fn label(&self) -> String {
        hex::encode(&self.id[..4])
    }

    // =========================================================================
    // Player commands
    // =========================================================================

    /// Pick the game mode. Only honoured during mode select.
    pub fn select_mode(&mut self, mode: GameMode) -> bool {
        if self.state.phase != MatchPhase::ModeSelect {
            return false;
        }
        self.mode = mode;
        info!("Match {} mode set to {:?}", self.label(), mode);
        true
    }

    /// A direction key went down.
    ///
    /// Returns the wake to re-arm, or `None` if the input was ignored.
    pub fn key_down(&mut self, player: &PlayerId, direction: Direction, now: u64) -> Option<Wake> {
        self.key_edge(player, direction, now, true)
    }

    /// A direction key went up.
    ///
    /// Returns the wake to re-arm, or `None` if the input was ignored.
    pub fn key_up(&mut self, player: &PlayerId, direction: Direction, now: u64) -> Option<Wake> {
        self.key_edge(player, direction, now, false)
    }

    fn key_edge(
        &mut self,
        player: &PlayerId,
        direction: Direction,
        now: u64,
        pressed: bool,
    ) -> Option<Wake> {
        let seat = self.seat_of(player)?;
        if self.state.phase != MatchPhase::Running {
            return None;
        }

        // Settle everything up to the edge under the old key state first.
        let wake = self.update(now);
        if self.state.phase != MatchPhase::Running {
            // The catch-up update ended the rally; the new round resets keys.
            return Some(wake);
        }

        let at = now.max(self.state.last_update);
        if pressed {
            self.state.keys.press(seat, direction, at);
        } else {
            self.state.keys.release(seat, direction);
        }
        self.push(MatchEvent::SyncData(Snapshot::capture(&self.state)));
        Some(wake)
    }

    /// A player left. Forfeits them unless the match is already decided.
    pub fn player_left(&mut self, player: &PlayerId) -> bool {
        let Some(seat) = self.seat_of(player) else {
            return false;
        };
        if !self.state.phase.accepts_forfeit() {
            return false;
        }

        self.state.scores.forfeit(seat);
        self.state.phase = MatchPhase::Finished;
        info!("Match {} player {} left, forfeit", self.label(), player.short());
        true
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Timer wake: update, then publish the table if the ball is in play.
    pub fn on_timer(&mut self, now: u64) -> Wake {
        let wake = self.update(now);
        if self.state.phase == MatchPhase::Running {
            self.push(MatchEvent::SyncData(Snapshot::capture(&self.state)));
        }
        wake
    }

    /// Advance the match to `now` and return the next wake.
    pub fn update(&mut self, now: u64) -> Wake {
        if self.state.phase != MatchPhase::Running {
            self.state.last_update = self.state.last_update.max(now);
        }

        match self.state.phase {
            MatchPhase::ModeSelect => self.mode_select(now),
            MatchPhase::Countdown => self.countdown(now),
            MatchPhase::Running => self.running(now),
            MatchPhase::Finished => self.finish(),
            MatchPhase::Torndown => Wake::Stop,
        }
    }

    fn mode_select(&mut self, now: u64) -> Wake {
        if now < self.state.round_deadline {
            return Wake::After(self.state.round_deadline - now);
        }

        self.begin_countdown(now);
        self.push(MatchEvent::game_start(self.mode, self.players[0].id, self.players[1].id));
        info!("Match {} starting in {:?} mode", self.label(), self.mode);
        Wake::After(PHASE_STEP_MS)
    }

    fn countdown(&mut self, now: u64) -> Wake {
        if self.state.scores.has_winner(self.config.winning_score) {
            self.state.phase = MatchPhase::Finished;
            return Wake::After(PHASE_STEP_MS);
        }

        if !self.state.round_ready {
            self.reset_round();
        }

        if now >= self.state.round_deadline {
            self.state.phase = MatchPhase::Running;
            self.state.last_update = now;
            debug!("Match {} round {} running", self.label(), self.state.round);
            return Wake::After(PHASE_STEP_MS);
        }

        let remaining_ms = self.state.round_deadline - now;
        self.push(MatchEvent::SyncData(Snapshot::capture(&self.state).frozen()));
        self.push(MatchEvent::Countdown { timestamp: now, remaining_ms });
        Wake::After(remaining_ms)
    }

    fn running(&mut self, now: u64) -> Wake {
        if now <= self.state.last_update {
            // Duplicate or out-of-order wake.
            return self.predicted_wake();
        }
        let dt = (now - self.state.last_update) as f64;
        let arena = self.config.arena();

        // 1. Paddles from held keys
        let elapsed = self.state.keys.drain_elapsed(now);
        apply_paddle_travel(&mut self.state.paddles, elapsed, self.state.speed.paddle, &arena);

        // 2. Ball
        let ball = &mut self.state.ball;
        ball.x = physics::integrate(ball.x, ball.vx, dt);
        ball.y = physics::integrate(ball.y, ball.vy, dt);

        // 3. Walls
        if let Some(hit) = physics::wall_hit(&arena, ball.y) {
            ball.y = physics::mirror(ball.y, physics::wall_boundary(&arena, hit));
            ball.vy = -ball.vy;
        }

        // 4. Paddle planes
        if let Some(hit) = physics::plane_hit(&arena, self.state.ball.x) {
            let seat = match hit {
                PlaneHit::Left => Seat::One,
                PlaneHit::Right => Seat::Two,
            };
            if physics::paddle_covers(&arena, self.state.paddles[seat.index()], self.state.ball.y) {
                self.paddle_bounce(seat, hit);
            } else {
                return self.score_point(seat.opponent(), now);
            }
        }

        self.keep_in_bounds();
        self.state.last_update = now;
        self.predicted_wake()
    }

    fn finish(&mut self) -> Wake {
        let [score1, score2] = self.state.scores.0;
        self.push(MatchEvent::Finished { score1, score2 });
        self.state.phase = MatchPhase::Torndown;
        info!("Match {} finished {}:{}", self.label(), score1, score2);
        Wake::After(FINISH_LINGER_MS)
    }

    // =========================================================================
    // Round helpers
    // =========================================================================

    fn begin_countdown(&mut self, now: u64) {
        self.state.phase = MatchPhase::Countdown;
        self.state.round_deadline = now + COUNTDOWN_MS;
        self.state.round_ready = false;
    }

    /// Center everything and serve in a random direction.
    fn reset_round(&mut self) {
        let serve = self.config.serve_speed(self.mode);
        let vx = if self.rng.coin_flip() { -serve } else { serve };
        let vy = vx * SERVE_CONE * self.rng.next_signed_unit();
        let paddle_y = (self.config.canvas_height - self.config.paddle_height) / 2.0;

        let state = &mut self.state;
        state.ball.x = self.config.canvas_width / 2.0;
        state.ball.y = self.config.canvas_height / 2.0;
        state.ball.vx = vx;
        state.ball.vy = vy;
        state.paddles = [paddle_y, paddle_y];
        state.speed.ball_limit = serve;
        state.speed.paddle = self.config.paddle_base_speed;
        state.keys.clear();
        state.round_ready = true;
    }

    fn paddle_bounce(&mut self, seat: Seat, hit: PlaneHit) {
        let arena = self.config.arena();
        let state = &mut self.state;
        state.ball.x = physics::mirror(state.ball.x, physics::plane_boundary(&arena, hit));

        match self.mode {
            GameMode::Default => state.ball.vx = -state.ball.vx,
            GameMode::Speed => {
                state.speed.ball_limit =
                    (state.speed.ball_limit * SPEED_RATCHET).min(self.config.ball_speed_max);
                state.speed.paddle =
                    (state.speed.paddle * SPEED_RATCHET).min(self.config.paddle_speed_max);
                state.ball.vx = match seat {
                    Seat::One => state.speed.ball_limit,
                    Seat::Two => -state.speed.ball_limit,
                };
            }
        }

        let limit = state.speed.ball_limit;
        match state.keys.steering(seat) {
            Some(Direction::Up) => state.ball.vy = (state.ball.vy - limit / 2.0).max(-limit),
            Some(Direction::Down) => state.ball.vy = (state.ball.vy + limit / 2.0).min(limit),
            None => {}
        }
        debug!("Match {} bounce off {:?}", hex::encode(&self.id[..4]), seat);
    }

    fn score_point(&mut self, scorer: Seat, now: u64) -> Wake {
        self.keep_in_bounds();
        self.state.last_update = now;
        self.state.scores.award(scorer);
        self.state.round += 1;
        self.state.keys.clear();
        self.begin_countdown(now);

        let [score1, score2] = self.state.scores.0;
        self.push(MatchEvent::ScoreInfo {
            snapshot: Snapshot::capture(&self.state),
            score1,
            score2,
        });
        info!("Match {} point to {:?}: {}:{}", self.label(), scorer, score1, score2);
        Wake::After(PHASE_STEP_MS)
    }

    /// Clamp for overshoots larger than the distance to the boundary, which
    /// only happen when an update arrives far later than predicted.
    fn keep_in_bounds(&mut self) {
        let arena = self.config.arena();
        let ball = &mut self.state.ball;
        ball.x = ball.x.clamp(0.0, arena.width);
        ball.y = ball.y.clamp(arena.top_wall(), arena.bottom_wall());
    }

    fn predicted_wake(&self) -> Wake {
        let ball = &self.state.ball;
        let delay = physics::next_event_delay(&self.config.arena(), ball.x, ball.y, ball.vx, ball.vy);
        Wake::After(delay.ceil() as u64)
    }

    // =========================================================================
    // Result
    // =========================================================================

    /// Standings with ratings applied for ranked matches.
    pub fn result(&self) -> MatchResult {
        let winner_seat = self.state.scores.leader();
        let loser_seat = winner_seat.opponent();
        let winner = self.players[winner_seat.index()];
        let loser = self.players[loser_seat.index()];

        let ratings = if self.match_type.is_competitive() {
            RatingUpdate::elo(winner.rating, loser.rating)
        } else {
            RatingUpdate::unchanged(winner.rating, loser.rating)
        };

        MatchResult {
            match_type: self.match_type,
            winner: winner.id,
            loser: loser.id,
            winner_score: self.state.scores.get(winner_seat),
            loser_score: self.state.scores.get(loser_seat),
            ratings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Scoreboard, FORFEIT};
    use proptest::prelude::*;

    const T0: u64 = 1_700_000_000_000;

    fn p1() -> PlayerId {
        PlayerId::new([1; 16])
    }

    fn p2() -> PlayerId {
        PlayerId::new([2; 16])
    }

    fn engine(match_type: MatchType) -> MatchEngine {
        MatchEngine::new(
            [7; 16],
            MatchConfig::default(),
            [PlayerInfo::new(p1(), 1000), PlayerInfo::new(p2(), 1000)],
            match_type,
            42,
            T0,
        )
        .unwrap()
    }

    /// Engine in Running with the ball placed by hand.
    fn running_engine(x: f64, y: f64, vx: f64, vy: f64) -> MatchEngine {
        let mut e = engine(MatchType::Ranked);
        e.state.phase = MatchPhase::Running;
        e.state.round_ready = true;
        e.state.speed.ball_limit = e.config.serve_speed(e.mode);
        e.state.ball.x = x;
        e.state.ball.y = y;
        e.state.ball.vx = vx;
        e.state.ball.vy = vy;
        e.state.last_update = T0;
        e.take_events();
        e
    }

    /// Drive timer wakes until the phase changes or `limit` wakes pass.
    fn run_until_phase_change(e: &mut MatchEngine, mut now: u64, limit: usize) -> u64 {
        let start = e.phase();
        for _ in 0..limit {
            match e.on_timer(now) {
                Wake::After(ms) => now += ms,
                Wake::Stop => break,
            }
            if e.phase() != start {
                break;
            }
        }
        now
    }

    #[test]
    fn test_new_announces_match() {
        let mut e = engine(MatchType::Casual);
        assert_eq!(e.phase(), MatchPhase::ModeSelect);
        let events = e.take_events();
        assert_eq!(events, vec![MatchEvent::matched(p1(), p2())]);
    }

    #[test]
    fn test_rejects_same_player_twice() {
        let result = MatchEngine::new(
            [0; 16],
            MatchConfig::default(),
            [PlayerInfo::new(p1(), 1000), PlayerInfo::new(p1(), 1000)],
            MatchType::Casual,
            1,
            T0,
        );
        assert!(matches!(result, Err(EngineError::SamePlayer(_))));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = MatchConfig {
            canvas_height: 0.0,
            ..Default::default()
        };
        let result = MatchEngine::new(
            [0; 16],
            config,
            [PlayerInfo::new(p1(), 1000), PlayerInfo::new(p2(), 1000)],
            MatchType::Casual,
            1,
            T0,
        );
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_mode_select_times_out_to_default_countdown() {
        let mut e = engine(MatchType::Casual);
        e.take_events();

        assert_eq!(e.on_timer(T0), Wake::After(5_000));
        assert_eq!(e.on_timer(T0 + 1_200), Wake::After(3_800));
        assert_eq!(e.phase(), MatchPhase::ModeSelect);

        assert_eq!(e.on_timer(T0 + 5_000), Wake::After(1));
        assert_eq!(e.phase(), MatchPhase::Countdown);
        assert_eq!(e.mode(), GameMode::Default);
        assert_eq!(
            e.take_events(),
            vec![MatchEvent::game_start(GameMode::Default, p1(), p2())]
        );
    }

    #[test]
    fn test_select_mode_only_during_mode_select() {
        let mut e = engine(MatchType::Casual);
        assert!(e.select_mode(GameMode::Speed));
        e.on_timer(T0 + 5_000);
        assert!(!e.select_mode(GameMode::Default));
        assert_eq!(e.mode(), GameMode::Speed);
    }

    #[test]
    fn test_countdown_serves_within_cone_and_freezes_display() {
        let mut e = engine(MatchType::Casual);
        e.on_timer(T0 + 5_000);
        e.take_events();

        let wake = e.on_timer(T0 + 5_001);
        assert_eq!(wake, Wake::After(2_999));
        assert_eq!(e.phase(), MatchPhase::Countdown);

        let ball = e.state().ball;
        assert_eq!((ball.x, ball.y), (575.0, 300.0));
        assert!((ball.vx.abs() - 0.69).abs() < 1e-12);
        assert!(ball.vy.abs() <= SERVE_CONE * ball.vx.abs());

        let events = e.take_events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            MatchEvent::SyncData(s) => {
                assert_eq!(s.ball_vel_x, 0.0);
                assert_eq!(s.ball_vel_y, 0.0);
            }
            other => panic!("expected syncData, got {:?}", other),
        }
        assert_eq!(
            events[1],
            MatchEvent::Countdown { timestamp: T0 + 5_001, remaining_ms: 2_999 }
        );
    }

    #[test]
    fn test_countdown_advances_to_running() {
        let mut e = engine(MatchType::Casual);
        e.on_timer(T0 + 5_000);
        e.on_timer(T0 + 5_001);
        let served = e.state().ball;

        assert_eq!(e.on_timer(T0 + 8_000), Wake::After(1));
        assert_eq!(e.phase(), MatchPhase::Running);
        // No second re-serve on the transition
        assert_eq!(e.state().ball, served);
        // Running publishes a live snapshot
        let events = e.take_events();
        assert!(matches!(events.last(), Some(MatchEvent::SyncData(s)) if s.ball_vel_x != 0.0));
    }

    #[test]
    fn test_countdown_with_winner_skips_to_finished_without_reset() {
        let mut e = running_engine(44.0, 300.0, -0.69, 0.0);
        e.state.scores = Scoreboard([3, 4]);
        e.state.paddles[0] = 0.0;

        // Player 2 takes the fifth point
        e.on_timer(T0 + 1);
        assert_eq!(e.state().scores, Scoreboard([3, 5]));
        assert_eq!(e.phase(), MatchPhase::Countdown);
        let ball_at_point = e.state().ball;

        assert_eq!(e.on_timer(T0 + 2), Wake::After(1));
        assert_eq!(e.phase(), MatchPhase::Finished);
        assert_eq!(e.state().ball, ball_at_point);
    }

    #[test]
    fn test_bounce_when_paddle_spans_ball() {
        let mut e = running_engine(44.0, 300.0, -0.69, 0.0);
        e.state.paddles[0] = 225.0;

        e.on_timer(T0 + 1);
        assert_eq!(e.phase(), MatchPhase::Running);
        assert_eq!(e.state().scores, Scoreboard([0, 0]));
        assert!(e.state().ball.vx > 0.0);
        // Mirrored about x = 45
        assert!((e.state().ball.x - 46.69).abs() < 1e-9);
    }

    #[test]
    fn test_point_when_paddle_misses() {
        let mut e = running_engine(44.0, 300.0, -0.69, 0.0);
        e.state.paddles[0] = 0.0;
        e.state.keys.press(Seat::One, Direction::Up, T0);

        assert_eq!(e.on_timer(T0 + 1), Wake::After(1));
        assert_eq!(e.phase(), MatchPhase::Countdown);
        assert_eq!(e.state().scores, Scoreboard([0, 1]));
        assert_eq!(e.state().round, 1);
        assert_eq!(e.state().keys.0, [0; 4]);

        let events = e.take_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            MatchEvent::ScoreInfo { snapshot, score1, score2 } => {
                assert_eq!((*score1, *score2), (0, 1));
                assert_eq!(snapshot.key_state, [0; 4]);
                assert_eq!(snapshot.timestamp, T0 + 1);
            }
            other => panic!("expected scoreInfo, got {:?}", other),
        }
    }

    #[test]
    fn test_right_paddle_bounce_and_point() {
        let mut e = running_engine(1_104.0, 100.0, 0.69, 0.0);
        e.state.paddles[1] = 50.0;
        e.on_timer(T0 + 2);
        assert!(e.state().ball.vx < 0.0);
        assert!(e.state().ball.x < 1_105.0);

        let mut e = running_engine(1_104.0, 100.0, 0.69, 0.0);
        e.state.paddles[1] = 300.0;
        e.on_timer(T0 + 2);
        assert_eq!(e.state().scores, Scoreboard([1, 0]));
    }

    #[test]
    fn test_wall_reflection_preserves_overshoot() {
        let mut e = running_engine(575.0, 16.0, 0.5, -0.5);
        e.on_timer(T0 + 4);
        // 16 - 2 = 14, one past the wall at 15, mirrored to 16
        assert!((e.state().ball.y - 16.0).abs() < 1e-9);
        assert!(e.state().ball.vy > 0.0);
    }

    #[test]
    fn test_running_update_is_idempotent_for_same_time() {
        let mut e = running_engine(400.0, 200.0, 0.69, 0.2);
        let first = e.update(T0 + 250);
        let state = e.state().clone();
        let second = e.update(T0 + 250);

        assert_eq!(first, second);
        assert_eq!(e.state().ball, state.ball);
        assert_eq!(e.state().paddles, state.paddles);
        assert_eq!(e.state().last_update, state.last_update);
    }

    #[test]
    fn test_out_of_order_wake_is_absorbed() {
        let mut e = running_engine(400.0, 200.0, 0.69, 0.2);
        e.update(T0 + 100);
        let ball = e.state().ball;
        e.update(T0 + 50);
        assert_eq!(e.state().ball, ball);
        assert_eq!(e.state().last_update, T0 + 100);
    }

    #[test]
    fn test_wake_targets_next_collision() {
        let mut e = running_engine(575.0, 300.0, 1.0, 0.0);
        // 1105 - 575 = 530ms away, plus epsilon
        assert_eq!(e.update(T0), Wake::After(531));
    }

    #[test]
    fn test_key_reconciles_before_applying() {
        let mut e = running_engine(575.0, 300.0, 0.1, 0.0);

        // Down held from T0+100, released at T0+300: 200ms at 0.8 px/ms
        assert!(e.key_down(&p1(), Direction::Down, T0 + 100).is_some());
        assert_eq!(e.state().paddles[0], 225.0);
        assert!(e.key_up(&p1(), Direction::Down, T0 + 300).is_some());
        assert!((e.state().paddles[0] - 385.0).abs() < 1e-9);

        // Released key no longer moves the paddle
        e.on_timer(T0 + 1_000);
        assert!((e.state().paddles[0] - 385.0).abs() < 1e-9);

        let syncs = e
            .take_events()
            .into_iter()
            .filter(|ev| matches!(ev, MatchEvent::SyncData(_)))
            .count();
        assert_eq!(syncs, 3);
    }

    #[test]
    fn test_paddle_clamped_to_canvas() {
        let mut e = running_engine(575.0, 300.0, 0.1, 0.0);
        e.key_down(&p2(), Direction::Up, T0 + 1);
        e.on_timer(T0 + 2_000);
        assert_eq!(e.state().paddles[1], 0.0);
    }

    #[test]
    fn test_keys_ignored_outside_running_or_for_strangers() {
        let mut e = engine(MatchType::Casual);
        assert!(e.key_down(&p1(), Direction::Up, T0 + 10).is_none());

        let mut e = running_engine(575.0, 300.0, 0.1, 0.0);
        let stranger = PlayerId::new([9; 16]);
        assert!(e.key_down(&stranger, Direction::Up, T0 + 10).is_none());
        assert_eq!(e.state().keys.0, [0; 4]);
    }

    #[test]
    fn test_speed_mode_ratchets_and_steers() {
        let mut e = running_engine(44.0, 300.0, -0.805, 0.0);
        e.mode = GameMode::Speed;
        e.state.speed.ball_limit = 0.805;
        e.state.keys.press(Seat::One, Direction::Up, T0);

        e.on_timer(T0 + 1);
        let limit = 0.805 * SPEED_RATCHET;
        assert!((e.state().speed.ball_limit - limit).abs() < 1e-12);
        assert!((e.state().speed.paddle - 0.8 * SPEED_RATCHET).abs() < 1e-12);
        assert!((e.state().ball.vx - limit).abs() < 1e-12);
        assert!((e.state().ball.vy + limit / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_speed_ratchet_capped_for_both_paddles() {
        for (x, vx, paddle) in [(44.0, -1.15, 0usize), (1_106.0, 1.15, 1usize)] {
            let mut e = running_engine(x, 300.0, vx, 0.0);
            e.mode = GameMode::Speed;
            e.state.speed.ball_limit = 1.15;
            e.state.speed.paddle = 1.1;
            e.state.paddles[paddle] = 225.0;

            e.on_timer(T0 + 1);
            assert_eq!(e.state().speed.ball_limit, 1.15);
            assert_eq!(e.state().speed.paddle, 1.1);
            assert_eq!(e.state().ball.vx.abs(), 1.15);
        }
    }

    #[test]
    fn test_steering_clamped_to_limit() {
        let mut e = running_engine(1_106.0, 300.0, 0.69, 0.6);
        e.state.speed.ball_limit = 0.69;
        e.state.keys.press(Seat::Two, Direction::Down, T0);
        e.on_timer(T0 + 1);
        assert_eq!(e.state().ball.vx, -0.69);
        assert_eq!(e.state().ball.vy, 0.69);
    }

    #[test]
    fn test_player_left_forfeits() {
        let mut e = running_engine(575.0, 300.0, 0.1, 0.0);
        assert!(!e.player_left(&PlayerId::new([9; 16])));
        assert!(e.player_left(&p1()));
        assert_eq!(e.phase(), MatchPhase::Finished);
        assert_eq!(e.state().scores, Scoreboard([FORFEIT, 0]));

        // Already decided
        assert!(!e.player_left(&p2()));

        let result = e.result();
        assert_eq!(result.winner, p2());
        assert_eq!(result.loser_score, FORFEIT);
    }

    #[test]
    fn test_finished_announces_once_then_stops() {
        let mut e = engine(MatchType::Ranked);
        e.player_left(&p2());
        e.take_events();

        assert_eq!(e.on_timer(T0 + 10), Wake::After(1_000));
        assert_eq!(e.phase(), MatchPhase::Torndown);
        assert_eq!(e.take_events(), vec![MatchEvent::Finished { score1: 0, score2: FORFEIT }]);

        assert_eq!(e.on_timer(T0 + 1_010), Wake::Stop);
        assert_eq!(e.on_timer(T0 + 2_000), Wake::Stop);
        assert!(e.take_events().is_empty());
    }

    #[test]
    fn test_result_ratings_by_match_type() {
        let mut ranked = engine(MatchType::Ranked);
        ranked.state.scores = Scoreboard([5, 2]);
        let result = ranked.result();
        assert_eq!(result.winner, p1());
        assert_eq!(result.ratings, RatingUpdate { winner: 1016, loser: 984 });
        assert_eq!((result.winner_score, result.loser_score), (5, 2));

        let mut private = engine(MatchType::Private);
        private.state.scores = Scoreboard([1, 5]);
        let result = private.result();
        assert_eq!(result.winner, p2());
        assert_eq!(result.ratings, RatingUpdate { winner: 1000, loser: 1000 });
    }

    #[test]
    fn test_full_match_plays_out_without_input() {
        let mut e = engine(MatchType::Ranked);
        let mut now = T0;
        let mut guard = 0;
        loop {
            match e.on_timer(now) {
                Wake::After(ms) => now += ms,
                Wake::Stop => break,
            }
            assert!(e.state().in_bounds(e.config()));
            guard += 1;
            assert!(guard < 10_000, "match never ended");
        }
        assert_eq!(e.phase(), MatchPhase::Torndown);
        assert!(e.state().scores.has_winner(5));
        assert!(e.take_events().iter().any(|ev| matches!(ev, MatchEvent::Finished { .. })));
    }

    #[test]
    fn test_serve_cone_across_seeds() {
        use rand::Rng;
        let mut seeds = rand::thread_rng();
        for _ in 0..50 {
            let mut e = MatchEngine::new(
                [3; 16],
                MatchConfig::default(),
                [PlayerInfo::new(p1(), 1000), PlayerInfo::new(p2(), 1000)],
                MatchType::Casual,
                seeds.gen(),
                T0,
            )
            .unwrap();
            let now = run_until_phase_change(&mut e, T0, 4);
            e.on_timer(now);
            let ball = e.state().ball;
            assert!(ball.vy.abs() <= SERVE_CONE * ball.vx.abs());
        }
    }

    proptest! {
        #[test]
        fn prop_random_inputs_keep_invariants(
            seed in any::<u64>(),
            edges in proptest::collection::vec((0u64..400, any::<bool>(), any::<bool>(), any::<bool>()), 1..80),
        ) {
            let mut e = MatchEngine::new(
                [5; 16],
                MatchConfig::default(),
                [PlayerInfo::new(p1(), 1200), PlayerInfo::new(p2(), 1100)],
                MatchType::Ranked,
                seed,
                T0,
            ).unwrap();

            let mut now = T0;
            let mut deadline = T0;
            let mut last_phase = e.phase();
            for (gap, second, down, press) in edges {
                now += gap;
                // Timer wakes that came due before this edge
                while deadline <= now {
                    match e.on_timer(deadline) {
                        Wake::After(ms) => deadline += ms,
                        Wake::Stop => { deadline = u64::MAX; break; }
                    }
                }
                let player = if second { p2() } else { p1() };
                let direction = if down { Direction::Down } else { Direction::Up };
                let wake = if press {
                    e.key_down(&player, direction, now)
                } else {
                    e.key_up(&player, direction, now)
                };
                if let Some(Wake::After(ms)) = wake {
                    deadline = now + ms;
                }

                let phase = e.phase();
                let regressed = phase < last_phase
                    && !(phase == MatchPhase::Countdown && last_phase == MatchPhase::Running);
                prop_assert!(!regressed);
                last_phase = phase;

                for score in e.state().scores.0 {
                    prop_assert!(score == FORFEIT || (0..=5).contains(&score));
                }
                prop_assert!(e.state().in_bounds(e.config()));
            }
        }
    }
}
