//! Format discovery and selector building.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use reclip_models::{parse_resolution, FormatsResponse, VideoFormat};
use tracing::{info, warn};

use crate::download::YtDlp;
use crate::ytdlp::{codec_rank, parse_format_line};

/// Lists the video-only formats a source offers.
#[derive(Debug, Clone)]
pub struct FormatDiscovery {
    ytdlp: YtDlp,
}

impl FormatDiscovery {
    pub fn new(ytdlp: YtDlp) -> Self {
        Self { ytdlp }
    }

    /// Best format per resolution/fps, highest first.
    ///
    /// A downloader that cannot be started or exits abnormally yields an
    /// empty list.
    pub async fn list_formats(&self, url: &str) -> Vec<VideoFormat> {
        match self.ytdlp.list_format_lines(url).await {
            Ok(lines) => {
                let formats = select_formats(lines.iter().map(String::as_str));
                info!(url, count = formats.len(), "Discovered formats");
                formats
            }
            Err(e) => {
                warn!(url, error = %e, "Format discovery failed");
                Vec::new()
            }
        }
    }

    pub async fn formats_response(&self, url: &str) -> FormatsResponse {
        FormatsResponse::video(self.list_formats(url).await)
    }
}

struct Candidate {
    format: VideoFormat,
    rank: u8,
    seen: usize,
}

/// Deduplicate and order the rows of a `-F` listing.
///
/// One entry per `resolution@fps`, keeping the best codec rank (first seen
/// wins ties), sorted by height then fps, both descending.
pub fn select_formats<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<VideoFormat> {
    let mut best: HashMap<(String, String), Candidate> = HashMap::new();

    for (seen, line) in lines.into_iter().enumerate() {
        let Some(format) = parse_format_line(line) else {
            continue;
        };
        let rank = codec_rank(line);
        let key = (format.resolution.clone(), format.fps.clone());

        match best.entry(key) {
            Entry::Occupied(mut entry) => {
                if rank < entry.get().rank {
                    let current = entry.get_mut();
                    current.format = format;
                    current.rank = rank;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Candidate { format, rank, seen });
            }
        }
    }

    let mut candidates: Vec<Candidate> = best.into_values().collect();
    candidates.sort_by(|a, b| {
        b.format
            .height()
            .cmp(&a.format.height())
            .then_with(|| b.format.fps_value().cmp(&a.format.fps_value()))
            .then_with(|| a.seen.cmp(&b.seen))
    });
    candidates.into_iter().map(|c| c.format).collect()
}

/// Build a `/`-separated fallback chain for the downloader.
///
/// `("137", "1920x1080")` gives `137/bv*[height<=1080]/bv*`. Non-numeric ids
/// and unparseable resolutions are skipped; the chain always ends in `bv*`.
pub fn build_format_selector(format_id: Option<&str>, resolution: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(3);

    if let Some(id) = format_id.map(str::trim) {
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            parts.push(id.to_string());
        }
    }

    if let Some((_, height)) = resolution.and_then(parse_resolution) {
        parts.push(format!("bv*[height<={}]", height));
    }

    parts.push("bv*".to_string());
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LISTING: &str = "\
[youtube] Extracting URL: https://www.youtube.com/watch?v=abc
[info] Available formats for abc:
ID  EXT   RESOLUTION FPS CH |   FILESIZE   TBR PROTO | VCODEC          VBR ACODEC      ABR ASR MORE INFO
---------------------------------------------------------------------------------------------------------
140 m4a   audio only      2 |    3.27MiB  129k https | audio only          mp4a.40.2  129k 44k medium, m4a_dash
160 mp4   256x144     30    |    1.01MiB   40k https | avc1.4d400c     40k video only              144p, mp4_dash
278 webm  256x144     30    |    1.20MiB   47k https | vp9             47k video only              144p, webm_dash
247 webm  1280x720    30    |   10.22MiB  403k https | vp9            403k video only              720p, webm_dash
398 mp4   1280x720    30    |    9.01MiB  355k https | av01.0.05M.08  355k video only              720p, mp4_dash
136 mp4   1280x720    30    |   12.90MiB  509k https | avc1.4d401f    509k video only              720p, mp4_dash
298 mp4   1280x720    60    |   20.10MiB  800k https | avc1.4d4020    800k video only              720p60, mp4_dash
303 webm  1920x1080   60    |   40.00MiB 1600k https | vp9           1600k video only              1080p60, webm_dash
399 mp4   1920x1080   30    |   25.00MiB 1000k https | av01.0.08M.08 1000k video only              1080p, mp4_dash
137 mp4   1920x1080   30    |   30.00MiB 1200k https | avc1.640028   1200k video only              1080p, mp4_dash
18  mp4   640x360     30  2 |    5.00MiB  200k https | avc1.42001E        mp4a.40.2       44k 360p
";

    #[test]
    fn test_select_formats_dedup_and_order() {
        let formats = select_formats(LISTING.lines());
        let ids: Vec<&str> = formats.iter().map(|f| f.id.as_str()).collect();

        assert_eq!(ids, vec!["303", "137", "298", "136", "160"]);
        assert_eq!(formats[1].label(), "1920x1080 (30fps)");
    }

    #[test]
    fn test_select_formats_first_seen_wins_ties() {
        let lines = [
            "247 webm 1280x720 30 | 10MiB | vp9 video only",
            "302 webm 1280x720 30 | 11MiB | vp9 video only",
        ];
        let formats = select_formats(lines);
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].id, "247");
    }

    #[test]
    fn test_select_formats_empty_listing() {
        assert!(select_formats(["ERROR: unable to download webpage"]).is_empty());
    }

    #[test]
    fn test_selector_full_chain() {
        assert_eq!(
            build_format_selector(Some("137"), Some("1920x1080")),
            "137/bv*[height<=1080]/bv*"
        );
    }

    #[test]
    fn test_selector_partial() {
        assert_eq!(build_format_selector(Some("137"), None), "137/bv*");
        assert_eq!(build_format_selector(None, Some("1280x720")), "bv*[height<=720]/bv*");
        assert_eq!(build_format_selector(None, None), "bv*");
        assert_eq!(build_format_selector(Some("best"), Some("huge")), "bv*");
        assert_eq!(build_format_selector(Some(""), Some("")), "bv*");
    }

    const HEIGHTS: [u32; 4] = [144, 360, 720, 1080];
    const CODECS: [&str; 4] = ["avc1.640028", "av01.0.08M.08", "vp9", "hev1.1.6.L93"];

    /// `(height, fps, codec index)` per listing row. The codec index doubles
    /// as its preference order.
    fn listing_rows() -> impl Strategy<Value = Vec<(u32, u32, usize)>> {
        prop::collection::vec(
            (
                prop::sample::select(HEIGHTS.to_vec()),
                prop::sample::select(vec![24u32, 30, 60]),
                0..CODECS.len(),
            ),
            2..40,
        )
    }

    fn render(rows: &[(u32, u32, usize)]) -> Vec<String> {
        rows.iter()
            .enumerate()
            .map(|(i, (h, fps, codec))| {
                format!(
                    "{} mp4 {}x{} {} | 10MiB 400k https | {} 400k video only",
                    100 + i,
                    h * 16 / 9,
                    h,
                    fps,
                    CODECS[*codec]
                )
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// *For any* listing, the output holds one entry per resolution/fps
        /// pair, strictly ordered by (height desc, fps desc), each being the
        /// best-ranked and then first-seen row for its pair.
        #[test]
        fn prop_select_formats_sorted_and_deduplicated(rows in listing_rows()) {
            let lines = render(&rows);
            let formats = select_formats(lines.iter().map(String::as_str));

            let mut keys: Vec<(u32, u32)> = rows.iter().map(|(h, fps, _)| (*h, *fps)).collect();
            keys.sort_unstable();
            keys.dedup();
            prop_assert_eq!(formats.len(), keys.len());

            for pair in formats.windows(2) {
                let a = (pair[0].height(), pair[0].fps_value());
                let b = (pair[1].height(), pair[1].fps_value());
                prop_assert!(a > b, "{:?} listed before {:?}", a, b);
            }

            for format in &formats {
                let key = (format.height(), format.fps_value());
                let best = rows
                    .iter()
                    .enumerate()
                    .filter(|(_, (h, fps, _))| (*h, *fps) == key)
                    .min_by_key(|(i, (_, _, codec))| (*codec, *i))
                    .map(|(i, _)| (100 + i).to_string());
                prop_assert_eq!(Some(format.id.clone()), best);
            }
        }
    }
}
