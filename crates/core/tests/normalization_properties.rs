use proptest::prelude::*;
use pulse_core::{normalize_tokens, tokens_from, AggregateStore, Prompt, SyncReason};

const VOCABULARY: &[&str] = &[
    "responder emails",
    "Contestar Mails",
    "e-mails",
    "Actas de reuniones",
    "resumir reuniones",
    "Propuestas comerciales",
    "informe de ventas",
    "Requisitos técnicos",
    "reportes",
    "Facturas pendientes de clientes",
    "facturas clientes",
    "Inventario del almacén",
    "nóminas",
    "de la",
    "   ",
    "?!",
];

proptest! {
    #[test]
    fn normalizing_is_idempotent(input in "[A-Za-zÁÉÍÓÚáéíóúñÑ ,.!¿?-]{0,48}") {
        let once = tokens_from(&input);
        prop_assert_eq!(normalize_tokens(&once), once);
    }

    #[test]
    fn case_accents_and_punctuation_do_not_matter(words in prop::collection::vec("[a-z]{1,9}", 1..6)) {
        let plain = words.join(" ");
        let shouted = plain.to_uppercase();
        let accented: String = plain
            .chars()
            .map(|c| match c {
                'a' => 'á',
                'e' => 'é',
                'i' => 'í',
                'o' => 'ó',
                'u' => 'ú',
                other => other,
            })
            .collect();
        let punctuated = format!("  ¡{}!? ", words.join(", "));
        let expected = tokens_from(&plain);
        prop_assert_eq!(tokens_from(&shouted), expected.clone());
        prop_assert_eq!(tokens_from(&accented), expected.clone());
        prop_assert_eq!(tokens_from(&punctuated), expected);
    }

    #[test]
    fn counts_are_conserved(picks in prop::collection::vec((0..VOCABULARY.len(), any::<bool>()), 0..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = AggregateStore::default();
        let mut expected = [0u64; 2];
        runtime.block_on(async {
            for (idx, second) in &picks {
                let prompt = if *second { Prompt::B } else { Prompt::A };
                let raw = VOCABULARY[*idx];
                if store.resolve_and_increment(prompt, raw).await.is_some() {
                    expected[prompt.index()] += 1;
                }
            }
        });
        let snap = store.snapshot(SyncReason::ClientRequest);
        prop_assert_eq!(snap.total(Prompt::A), expected[0]);
        prop_assert_eq!(snap.total(Prompt::B), expected[1]);
        prop_assert_eq!(snap.meta.version, expected[0] + expected[1]);
        for prompt in Prompt::ALL {
            let counts: Vec<u64> = snap.items(prompt).iter().map(|i| i.count).collect();
            prop_assert!(counts.windows(2).all(|w| w[0] >= w[1]));
            prop_assert!(counts.iter().all(|c| *c > 0));
        }
    }
}
