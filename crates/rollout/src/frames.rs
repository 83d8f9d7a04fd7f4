//! Frame selection for transport.
//!
//! Full episodes render hundreds of frames. Consumers want either three
//! representative stills or a bounded animation, so selection happens here
//! by reference and encoding stays the caller's concern.

use crate::Frame;

/// Start, middle, and end of a captured episode.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameSnapshots<'a> {
    pub start: Option<&'a Frame>,
    pub middle: Option<&'a Frame>,
    pub end: Option<&'a Frame>,
}

/// Picks the first, middle, and last frames.
///
/// All three fields are `None` for an empty capture. For short captures the
/// same frame may back more than one field: a single frame fills all three.
#[must_use]
pub fn snapshots(frames: &[Frame]) -> FrameSnapshots<'_> {
    if frames.is_empty() {
        return FrameSnapshots::default();
    }
    FrameSnapshots {
        start: frames.first(),
        middle: frames.get(frames.len() / 2),
        end: frames.last(),
    }
}

/// Evenly thins a capture down to at most `max_frames` frames.
///
/// Selection keeps every `stride`-th frame starting from the first, with
/// `stride` chosen so the output never exceeds the cap. Returns `None` for
/// an empty capture and the full sequence when it already fits.
#[must_use]
pub fn sample_sequence(frames: &[Frame], max_frames: usize) -> Option<Vec<&Frame>> {
    if frames.is_empty() || max_frames == 0 {
        return None;
    }
    let stride = (frames.len() / max_frames).max(1);
    Some(frames.iter().step_by(stride).take(max_frames).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> Frame {
        Frame::new(1, 1, vec![tag, tag, tag])
    }

    fn capture(len: usize) -> Vec<Frame> {
        (0..len).map(|i| frame(u8::try_from(i).unwrap())).collect()
    }

    fn tag(f: &Frame) -> u8 {
        f.data[0]
    }

    #[test]
    fn snapshots_of_empty_capture_are_all_none() {
        let picks = snapshots(&[]);
        assert!(picks.start.is_none());
        assert!(picks.middle.is_none());
        assert!(picks.end.is_none());
    }

    #[test]
    fn single_frame_fills_all_three_snapshots() {
        let frames = capture(1);
        let picks = snapshots(&frames);
        assert_eq!(picks.start.map(tag), Some(0));
        assert_eq!(picks.middle.map(tag), Some(0));
        assert_eq!(picks.end.map(tag), Some(0));
    }

    #[test]
    fn five_frames_pick_first_center_last() {
        let frames = capture(5);
        let picks = snapshots(&frames);
        assert_eq!(picks.start.map(tag), Some(0));
        assert_eq!(picks.middle.map(tag), Some(2));
        assert_eq!(picks.end.map(tag), Some(4));
    }

    #[test]
    fn sequence_of_empty_capture_is_none() {
        assert!(sample_sequence(&[], 10).is_none());
    }

    #[test]
    fn short_sequence_passes_through_whole() {
        let frames = capture(7);
        let picked = sample_sequence(&frames, 10).unwrap();
        assert_eq!(picked.len(), 7);
        let tags: Vec<u8> = picked.iter().map(|f| tag(f)).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn long_sequence_is_thinned_to_cap() {
        let frames = capture(200);
        let picked = sample_sequence(&frames, 40).unwrap();
        assert_eq!(picked.len(), 40);
        assert_eq!(tag(picked[0]), 0);
        assert_eq!(tag(picked[1]), 5);
    }

    #[test]
    fn output_never_exceeds_cap_for_any_length() {
        for len in 1..=50 {
            let frames = capture(len);
            for cap in 1..=12 {
                let picked = sample_sequence(&frames, cap).unwrap();
                assert!(
                    picked.len() <= cap,
                    "len {len} cap {cap} yielded {}",
                    picked.len()
                );
            }
        }
    }

    #[test]
    fn zero_cap_yields_none() {
        let frames = capture(3);
        assert!(sample_sequence(&frames, 0).is_none());
    }
}
