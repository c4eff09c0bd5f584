//! Static lookup data. Order matters wherever a table is scanned.

use extrato_core::AccountType;

pub struct CategoryKeywords {
    pub name: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub keywords: &'static [&'static str],
}

/// Scanned in order; on equal scores the earlier entry wins.
pub const CATEGORY_TABLE: &[CategoryKeywords] = &[
    CategoryKeywords {
        name: "Alimentação",
        color: "#FF6B6B",
        icon: "basket",
        keywords: &[
            "restaurante", "lanchonete", "padaria", "supermercado", "mercado", "açougue", "peixaria",
            "hortifruti", "delivery", "ifood", "rappi", "uber eats", "mcdonalds", "burger king",
            "subway", "pizza", "pizzaria", "café", "cafeteria", "starbucks", "bebida", "bebidas", "bar",
            "boteco", "cervejaria", "churrascaria", "sorveteria", "doceria", "confeitaria", "fast food",
            "comida", "alimento", "alimentação", "marukame", "coco bambu", "dona conce", "pizza pazza",
            "mi garba", "estripulia", "tradição da roca", "patio", "restaurante", "rest", "lanche",
            "lanches",
        ],
    },
    CategoryKeywords {
        name: "Transporte",
        color: "#4ECDC4",
        icon: "car-front",
        keywords: &[
            "uber", "taxi", "99", "cabify", "posto", "combustível", "gasolina", "etanol", "diesel",
            "estacionamento", "parking", "pedágio", "pedagio", "metro", "metrô", "ônibus", "onibus",
            "bilhete", "passagem", "transporte", "viagem", "viagens", "aéreo", "aereo", "aviao",
            "avião", "hotel", "hospedagem", "aluguel de carro", "zeppelin", "tereza cristina", "quick",
            "lagoa santa", "auto bitts", "direcao", "direção", "auto", "carro", "moto", "bicicleta",
            "bike",
        ],
    },
    CategoryKeywords {
        name: "Saúde",
        color: "#96CEB4",
        icon: "heart-pulse",
        keywords: &[
            "farmacia", "farmácia", "drogaria", "drogaria araujo", "raia", "pacheco", "medicamento",
            "remédio", "remedio", "consulta", "médico", "medico", "dentista", "clínica", "clinica",
            "hospital", "exame", "laboratório", "laboratorio", "plano de saúde", "unimed", "amil",
            "sulamerica", "saude", "saúde",
        ],
    },
    CategoryKeywords {
        name: "Casa",
        color: "#45B7D1",
        icon: "house",
        keywords: &[
            "luz", "energia", "cemig", "copel", "água", "agua", "sabesp", "sanepar", "gás", "gas",
            "copa energia", "internet", "net", "vivo", "claro", "oi", "tim", "telefone", "celular",
            "aluguel", "condomínio", "condominio", "iptu", "iptu", "reforma", "construção",
            "construcao", "material de construção", "decoração", "decoracao", "móveis", "moveis",
            "eletrodomésticos", "eletrodomesticos", "limpeza", "produtos de limpeza", "supermercado 2b",
            "supermercado e padaria",
        ],
    },
    CategoryKeywords {
        name: "Educação",
        color: "#9B59B6",
        icon: "book",
        keywords: &[
            "escola", "faculdade", "universidade", "curso", "cursos", "aula", "aulas", "livro",
            "livros", "material escolar", "mensalidade", "matrícula", "matricula", "ensino", "educação",
            "educacao", "apostila", "apostilas",
        ],
    },
    CategoryKeywords {
        name: "Lazer",
        color: "#F39C12",
        icon: "film",
        keywords: &[
            "cinema", "teatro", "show", "shows", "festival", "festivais", "ingresso", "ingressos",
            "parque", "parques", "diversão", "diversao", "fator diversoes", "jogo", "jogos",
            "videogame", "playstation", "xbox", "nintendo", "streaming", "netflix", "spotify",
            "amazon prime", "disney", "hbo", "youtube premium", "diamond mall", "shopping", "loja",
            "lojas", "compras", "compra",
        ],
    },
    CategoryKeywords {
        name: "Vestuário",
        color: "#E74C3C",
        icon: "shirt",
        keywords: &[
            "roupa", "roupas", "vestuário", "vestuario", "calçado", "calcado", "sapato", "sapatos",
            "camisa", "camisas", "calça", "calcas", "moda", "fashion", "boutique", "loja de roupas",
            "zara", "h&m", "renner", "c&a", "riachuelo", "slo silva lobo", "borelli", "lindt",
        ],
    },
    CategoryKeywords {
        name: "Serviços",
        color: "#95A5A6",
        icon: "tools",
        keywords: &[
            "banco", "tarifa", "tarifas", "anuidade", "anuidades", "taxa", "taxas", "serviço",
            "servicos", "manutenção", "manutencao", "reparo", "reparos", "conserto", "consertos",
            "tabelionato", "cartório", "cartorio", "documento", "documentos", "cpf", "rg", "certidão",
            "certidao",
        ],
    },
    CategoryKeywords {
        name: "Doações",
        color: "#E67E22",
        icon: "heart",
        keywords: &[
            "doação", "doacoes", "doação", "doar", "caridade", "ong", "ong's", "comunidade", "igreja",
            "templo", "dízimo", "dizimo", "oferta", "ofertas", "comunidade crista luz",
            "comun crist luz nacoes",
        ],
    },
    CategoryKeywords {
        name: "Pessoal",
        color: "#3498DB",
        icon: "person",
        keywords: &[
            "salão", "salao", "cabeleireiro", "cabeleireira", "barbeiro", "barbeiro", "estética",
            "estetica", "spa", "massagem", "unha", "unhas", "manicure", "pedicure", "cosmético",
            "cosmetico", "perfume", "perfumes", "maquiagem",
        ],
    },
    CategoryKeywords {
        name: "Pets",
        color: "#1ABC9C",
        icon: "paw",
        keywords: &[
            "pet", "pets", "cachorro", "cachorros", "gato", "gatos", "veterinário", "veterinario",
            "ração", "racao", "pet shop", "petshop", "animal", "animais",
        ],
    },
];

pub static FALLBACK_CATEGORY: CategoryKeywords = CategoryKeywords {
    name: "Outros",
    color: "#6C757D",
    icon: "circle",
    keywords: &[],
};

pub const BANK_CODES: &[(&str, &str)] = &[
    ("001", "Banco do Brasil"),
    ("033", "Santander"),
    ("077", "Banco Inter"),
    ("104", "Caixa Econômica Federal"),
    ("237", "Bradesco"),
    ("260", "Nubank"),
    ("341", "Itaú"),
];

pub const OFX_ACCOUNT_TYPES: &[(&str, AccountType)] = &[
    ("CHECKING", AccountType::Checking),
    ("SAVINGS", AccountType::Savings),
    ("MONEYMRKT", AccountType::Savings),
    ("CREDITLINE", AccountType::CreditCard),
    ("CREDITCARD", AccountType::CreditCard),
    ("INVESTMENT", AccountType::Investment),
];

/// Filename keywords, first hit wins.
pub const FILENAME_INSTITUTIONS: &[(&[&str], &str)] = &[
    (&["nubank"], "Nubank"),
    (&["inter"], "Banco Inter"),
    (&["itau", "itaú"], "Itaú"),
    (&["bradesco"], "Bradesco"),
    (&["santander"], "Santander"),
    (&["bb", "brasil"], "Banco do Brasil"),
];

pub const CREDIT_CARD_FILENAME_HINTS: &[&str] = &["cartao", "cartão", "credito", "crédito"];

/// Display defaults for accounts the resolver creates: (type, color, icon).
pub const ACCOUNT_TYPE_STYLES: &[(AccountType, &str, &str)] = &[
    (AccountType::Checking, "#3B82F6", "bank"),
    (AccountType::Savings, "#10B981", "piggy-bank"),
    (AccountType::CreditCard, "#8B5CF6", "credit-card"),
    (AccountType::Wallet, "#6366F1", "wallet2"),
    (AccountType::Investment, "#F59E0B", "graph-up-arrow"),
];

/// Header signatures of the Nubank exports. Each signature is a list of
/// marker groups; a line matches when every group has a member in it.
pub const NUBANK_HEADER_SIGNATURES: &[&[&[&str]]] = &[
    &[&["data"], &["descrição", "descricao"], &["valor"]],
    &[&["data"], &["valor"], &["identificador"]],
    &[&["date"], &["title"], &["amount"]],
];

pub fn bank_name(bank_id: &str) -> Option<&'static str> {
    let code = format!("{:0>3}", bank_id.trim());
    BANK_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

pub fn ofx_account_type(raw: &str) -> AccountType {
    let raw = raw.trim().to_uppercase();
    OFX_ACCOUNT_TYPES
        .iter()
        .find(|(code, _)| *code == raw)
        .map(|(_, ty)| *ty)
        .unwrap_or(AccountType::Wallet)
}

pub fn account_style(account_type: AccountType) -> (&'static str, &'static str) {
    ACCOUNT_TYPE_STYLES
        .iter()
        .find(|(ty, _, _)| *ty == account_type)
        .map(|(_, color, icon)| (*color, *icon))
        .unwrap_or(("#6366F1", "wallet2"))
}
