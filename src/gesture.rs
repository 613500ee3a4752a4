use crate::types::{
    GestureLabel, Handedness, LandmarkSet, INDEX_TIP, MIDDLE_TIP, NUM_LANDMARKS, PINKY_TIP,
    RING_TIP, THUMB_TIP,
};

/// Classifies the detected hands into a single gesture label.
///
/// Only the first set is examined: the first detected hand wins and later
/// sets are ignored. That tie-break is deliberate, not an oversight. A hand
/// whose thumb tip sits above its index fingertip reads as a thumbs-up;
/// otherwise the handedness label decides, with `HandDetected` covering sets
/// that carry no usable handedness.
pub fn classify(hands: &[LandmarkSet]) -> GestureLabel {
    let Some(hand) = hands.first() else {
        return GestureLabel::Waiting;
    };
    if hand.points.len() < NUM_LANDMARKS {
        return GestureLabel::Waiting;
    }

    // Lesser y is higher up in image coordinates.
    if hand.points[THUMB_TIP][1] < hand.points[INDEX_TIP][1] {
        return GestureLabel::ThumbsUp;
    }

    match hand.handedness {
        Handedness::Left => GestureLabel::LeftHand,
        Handedness::Right => GestureLabel::RightHand,
        Handedness::Unknown => GestureLabel::HandDetected,
    }
}

/// Per-finger extension flags in thumb→pinky order.
///
/// The thumb counts as extended when its tip is left of the joint two
/// landmarks prior; every other finger when its tip is above that joint.
/// Classification does not consult this vector today; it is kept as a
/// reusable primitive.
pub fn finger_states(hand: &LandmarkSet) -> [bool; 5] {
    const TIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

    let mut states = [false; 5];
    if hand.points.len() < NUM_LANDMARKS {
        return states;
    }

    states[0] = hand.points[TIPS[0]][0] < hand.points[TIPS[0] - 2][0];
    for (slot, tip) in TIPS.iter().enumerate().skip(1) {
        states[slot] = hand.points[*tip][1] < hand.points[tip - 2][1];
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_hand(handedness: Handedness) -> LandmarkSet {
        LandmarkSet {
            points: vec![[0.5, 0.5, 0.0]; NUM_LANDMARKS],
            handedness,
        }
    }

    fn thumbs_up_hand() -> LandmarkSet {
        let mut hand = flat_hand(Handedness::Right);
        hand.points[THUMB_TIP] = [0.5, 0.2, 0.0];
        hand.points[INDEX_TIP] = [0.5, 0.8, 0.0];
        hand
    }

    #[test]
    fn no_hands_is_waiting() {
        assert_eq!(classify(&[]), GestureLabel::Waiting);
    }

    #[test]
    fn thumb_above_index_is_thumbs_up() {
        assert_eq!(classify(&[thumbs_up_hand()]), GestureLabel::ThumbsUp);
    }

    #[test]
    fn first_hand_wins_over_later_sets() {
        let second = flat_hand(Handedness::Left);
        assert_eq!(
            classify(&[thumbs_up_hand(), second]),
            GestureLabel::ThumbsUp
        );

        let first = flat_hand(Handedness::Left);
        assert_eq!(
            classify(&[first, thumbs_up_hand()]),
            GestureLabel::LeftHand
        );
    }

    #[test]
    fn handedness_decides_when_not_thumbs_up() {
        assert_eq!(
            classify(&[flat_hand(Handedness::Left)]),
            GestureLabel::LeftHand
        );
        assert_eq!(
            classify(&[flat_hand(Handedness::Right)]),
            GestureLabel::RightHand
        );
        assert_eq!(
            classify(&[flat_hand(Handedness::Unknown)]),
            GestureLabel::HandDetected
        );
    }

    #[test]
    fn short_landmark_set_is_waiting() {
        let stub = LandmarkSet {
            points: vec![[0.0, 0.0, 0.0]; 5],
            handedness: Handedness::Right,
        };
        assert_eq!(classify(&[stub]), GestureLabel::Waiting);
    }

    #[test]
    fn finger_states_compares_against_joint_two_prior() {
        let mut hand = flat_hand(Handedness::Unknown);
        // Thumb: tip left of IP joint -> extended.
        hand.points[THUMB_TIP] = [0.2, 0.5, 0.0];
        hand.points[THUMB_TIP - 2] = [0.6, 0.5, 0.0];
        // Index: tip above PIP joint -> extended.
        hand.points[INDEX_TIP] = [0.5, 0.2, 0.0];
        hand.points[INDEX_TIP - 2] = [0.5, 0.6, 0.0];
        // Middle: tip below PIP joint -> folded.
        hand.points[MIDDLE_TIP] = [0.5, 0.8, 0.0];
        hand.points[MIDDLE_TIP - 2] = [0.5, 0.4, 0.0];
        // Ring and pinky left flat: tip y equals joint y, not extended.

        assert_eq!(finger_states(&hand), [true, true, false, false, false]);
    }
}
